use crate::error::{GpkgError, Result};
use std::fmt;

/// A validated table or column name.
///
/// Any non-empty name without a double quote or NUL is accepted, so
/// hydrofabric tables such as `flowpath-attributes` work. Names are only ever
/// interpolated through [`Identifier::quoted`], where such a name cannot end
/// the quoted identifier early.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Identifier(String);

impl Identifier {
    pub fn new(name: &str) -> Result<Self> {
        if name.is_empty() || name.contains(['"', '\0']) {
            return Err(GpkgError::InvalidIdentifier(name.to_string()));
        }
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The identifier wrapped in double quotes.
    pub fn quoted(&self) -> String {
        format!(r#""{}""#, self.0)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::Identifier;
    use crate::error::GpkgError;

    #[test]
    fn accepts_table_and_column_names() {
        for name in [
            "hydrolocations",
            "hl_x",
            "_tmp",
            "T2",
            "flowpath-attributes",
            "divide-attributes",
            "lake id",
        ] {
            let ident = Identifier::new(name).expect("valid identifier");
            assert_eq!(ident.as_str(), name);
        }
        assert_eq!(
            Identifier::new("flowpath-attributes")
                .expect("valid identifier")
                .quoted(),
            r#""flowpath-attributes""#
        );
    }

    #[test]
    fn rejects_names_that_break_quoting() {
        for name in ["", r#"x" OR 1=1 --"#, r#"geom""#, "nul\0byte"] {
            let err = Identifier::new(name).expect_err("invalid identifier");
            assert!(matches!(err, GpkgError::InvalidIdentifier(ref n) if n == name));
        }
    }
}
