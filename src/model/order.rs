use crate::error::EngineError;

/// Output arrangement of source pages: position `p` holds the source index
/// shown as output page `p`. Source pages that do not appear are dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageOrder(Vec<usize>);

impl PageOrder {
    pub fn new(indices: Vec<usize>) -> Self {
        Self(indices)
    }

    /// `[0, 1, .., page_count - 1]`
    pub fn identity(page_count: usize) -> Self {
        Self((0..page_count).collect())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &usize> {
        self.0.iter()
    }

    pub fn is_identity(&self, page_count: usize) -> bool {
        self.0.len() == page_count && self.0.iter().enumerate().all(|(i, &s)| i == s)
    }

    /// First output position showing `source_index`
    pub fn position_of(&self, source_index: usize) -> Option<usize> {
        self.0.iter().position(|&s| s == source_index)
    }

    /// Check the order against the source page count.
    pub fn validate(&self, page_count: usize) -> Result<(), EngineError> {
        if self.0.is_empty() {
            return Err(EngineError::InvalidRequest(
                "page order is empty".to_string(),
            ));
        }
        if let Some(&bad) = self.0.iter().find(|&&s| s >= page_count) {
            return Err(EngineError::InvalidRequest(format!(
                "page order references page index {} but the document has {} pages",
                bad, page_count
            )));
        }
        Ok(())
    }
}

impl From<Vec<usize>> for PageOrder {
    fn from(indices: Vec<usize>) -> Self {
        Self(indices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_detection() {
        assert!(PageOrder::identity(3).is_identity(3));
        assert!(!PageOrder::identity(3).is_identity(4));
        assert!(!PageOrder::new(vec![1, 0, 2]).is_identity(3));
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let order = PageOrder::new(vec![0, 3]);
        assert!(order.validate(3).is_err());
        assert!(order.validate(4).is_ok());
    }

    #[test]
    fn test_validate_rejects_empty() {
        assert!(PageOrder::new(Vec::new()).validate(3).is_err());
    }

    #[test]
    fn test_position_of_first_occurrence() {
        let order = PageOrder::new(vec![2, 0, 2]);
        assert_eq!(order.position_of(2), Some(0));
        assert_eq!(order.position_of(1), None);
    }
}
