use anyhow::{bail, Result};
use crate::detection_runners::ort_detector::input_wrapper::X;

/// Ordered collection of named tensors, the unit passed in and out of an engine run.
#[derive(Debug, Clone, Default)]
pub struct Xs {
    names: Vec<String>,
    values: Vec<X>,
}

impl From<X> for Xs {
    fn from(x: X) -> Self {
        Self {
            names: vec![String::new()],
            values: vec![x],
        }
    }
}

impl std::ops::Index<usize> for Xs {
    type Output = X;

    fn index(&self, index: usize) -> &Self::Output {
        &self.values[index]
    }
}

impl IntoIterator for Xs {
    type Item = X;
    type IntoIter = std::vec::IntoIter<X>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}

impl Xs {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn push(&mut self, x: X) {
        self.names.push(String::new());
        self.values.push(x);
    }

    pub fn push_kv(&mut self, key: &str, x: X) -> Result<()> {
        if !key.is_empty() && self.names.iter().any(|n| n == key) {
            bail!("Tensor `{key}` already present");
        }
        self.names.push(key.to_string());
        self.values.push(x);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&X> {
        self.names
            .iter()
            .position(|n| n == key)
            .map(|i| &self.values[i])
    }

    pub fn take(&mut self, key: &str) -> Option<X> {
        let i = self.names.iter().position(|n| n == key)?;
        self.names.remove(i);
        Some(self.values.remove(i))
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_lookup_and_duplicates() {
        let mut xs = Xs::new();
        xs.push_kv("images", X::from(vec![0.0; 4])).unwrap();
        xs.push_kv("targets", X::from(vec![1.0; 6])).unwrap();
        assert!(xs.push_kv("images", X::from(vec![0.0])).is_err());
        assert_eq!(xs.get("targets").map(|x| x.len()), Some(6));
        assert!(xs.take("images").is_some());
        assert_eq!(xs.len(), 1);
        assert_eq!(xs[0].len(), 6);
    }
}
