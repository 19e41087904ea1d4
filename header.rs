use crate::errors::CountError;

/// Column names from the first row of a record source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    names: Vec<String>,
}

impl Header {
    pub fn parse(line: &str, delimiter: char) -> Self {
        Self {
            names: line.split(delimiter).map(str::to_string).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Zero-based position of the first column named exactly `field`.
    pub fn position(&self, field: &str) -> Result<usize, CountError> {
        self.names
            .iter()
            .position(|name| name == field)
            .ok_or_else(|| CountError::FieldNotFound {
                field: field.to_string(),
            })
    }
}

/// Parses `line` as a header and resolves `field` in one step.
pub fn resolve_field(line: &str, delimiter: char, field: &str) -> Result<usize, CountError> {
    Header::parse(line, delimiter).position(field)
}
