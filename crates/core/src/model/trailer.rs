//! Trailer dictionaries.

use super::objects::{Dictionary, Value};

/// A trailer dictionary, either from a classic `trailer` keyword or the
/// dictionary of a cross-reference stream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Trailer {
    dict: Dictionary,
}

impl Trailer {
    pub const fn new(dict: Dictionary) -> Self {
        Self { dict }
    }

    pub const fn dict(&self) -> &Dictionary {
        &self.dict
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.dict.get(key)
    }

    pub fn size(&self) -> Option<i64> {
        self.dict.get_int("Size")
    }

    /// Offset of the previous cross-reference section. Zero means none.
    pub fn prev(&self) -> Option<i64> {
        self.dict.get_int("Prev").filter(|&p| p > 0)
    }

    /// Offset of the cross-reference stream of a hybrid-reference file.
    pub fn xref_stm(&self) -> Option<i64> {
        self.dict.get_int("XRefStm").filter(|&p| p > 0)
    }

    pub fn root(&self) -> Option<&Value> {
        self.dict.get("Root")
    }

    pub fn encrypt(&self) -> Option<&Value> {
        self.dict.get("Encrypt")
    }

    pub fn info(&self) -> Option<&Value> {
        self.dict.get("Info")
    }

    pub fn id(&self) -> Option<&Value> {
        self.dict.get("ID")
    }

    /// Fill in keys this trailer does not define yet from an older one.
    pub(crate) fn merge_older(&mut self, older: &Self) {
        for (key, value) in older.dict.iter() {
            if !self.dict.contains_key(key) {
                self.dict.set(key.clone(), value.clone());
            }
        }
    }
}

impl From<Dictionary> for Trailer {
    fn from(dict: Dictionary) -> Self {
        Self::new(dict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newer_keys_win_on_merge() {
        let mut newer = Dictionary::new();
        newer.set("Size", Value::Int(9));
        newer.set("Root", Value::reference(1, 0));
        let mut older = Dictionary::new();
        older.set("Size", Value::Int(4));
        older.set("Root", Value::reference(7, 0));
        older.set("Info", Value::reference(3, 0));

        let mut merged = Trailer::new(newer);
        merged.merge_older(&Trailer::new(older));
        assert_eq!(merged.size(), Some(9));
        assert_eq!(merged.root(), Some(&Value::reference(1, 0)));
        assert_eq!(merged.info(), Some(&Value::reference(3, 0)));
    }

    #[test]
    fn zero_prev_means_none() {
        let mut d = Dictionary::new();
        d.set("Prev", Value::Int(0));
        assert_eq!(Trailer::new(d).prev(), None);
    }
}
