use std::collections::BTreeMap;

pub type Compound = BTreeMap<String, Tag>;

#[derive(Debug, Clone, PartialEq)]
pub enum Tag {
    End,
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    ByteArray(Vec<i8>),
    String(String),
    List(Vec<Tag>),
    Compound(Compound),
    IntArray(Vec<i32>),
    LongArray(Vec<i64>),
}

impl Tag {
    pub fn type_id(&self) -> u8 {
        match self {
            Tag::End => 0,
            Tag::Byte(_) => 1,
            Tag::Short(_) => 2,
            Tag::Int(_) => 3,
            Tag::Long(_) => 4,
            Tag::Float(_) => 5,
            Tag::Double(_) => 6,
            Tag::ByteArray(_) => 7,
            Tag::String(_) => 8,
            Tag::List(_) => 9,
            Tag::Compound(_) => 10,
            Tag::IntArray(_) => 11,
            Tag::LongArray(_) => 12,
        }
    }

    pub fn compound() -> Tag {
        Tag::Compound(Compound::new())
    }

    pub fn string(value: impl Into<String>) -> Tag {
        Tag::String(value.into())
    }

    /// Builder-style insert; does nothing when `self` is not a compound.
    pub fn with(mut self, key: &str, value: Tag) -> Tag {
        if let Tag::Compound(map) = &mut self {
            map.insert(key.to_owned(), value);
        }
        self
    }

    pub fn insert(&mut self, key: &str, value: Tag) -> Option<Tag> {
        match self {
            Tag::Compound(map) => map.insert(key.to_owned(), value),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Tag> {
        self.as_compound().and_then(|map| map.get(key))
    }

    /// Follows a `/`-separated path of compound keys.
    pub fn get_path(&self, path: &str) -> Option<&Tag> {
        path.split('/')
            .filter(|segment| !segment.is_empty())
            .try_fold(self, |tag, key| tag.get(key))
    }

    pub fn as_compound(&self) -> Option<&Compound> {
        match self {
            Tag::Compound(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Tag]> {
        match self {
            Tag::List(list) => Some(list),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Tag::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i8(&self) -> Option<i8> {
        match self {
            Tag::Byte(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Tag::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Tag::Long(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_long_array(&self) -> Option<&[i64]> {
        match self {
            Tag::LongArray(longs) => Some(longs),
            _ => None,
        }
    }
}

impl From<bool> for Tag {
    fn from(value: bool) -> Self {
        Tag::Byte(value as i8)
    }
}

impl From<i32> for Tag {
    fn from(value: i32) -> Self {
        Tag::Int(value)
    }
}

impl From<i64> for Tag {
    fn from(value: i64) -> Self {
        Tag::Long(value)
    }
}

impl From<&str> for Tag {
    fn from(value: &str) -> Self {
        Tag::String(value.to_owned())
    }
}

impl From<String> for Tag {
    fn from(value: String) -> Self {
        Tag::String(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_and_path_lookup() {
        let level = Tag::compound().with(
            "Data",
            Tag::compound()
                .with("LevelName", "harbor".into())
                .with("version", Tag::compound().with("Id", 3218.into())),
        );

        assert_eq!(
            level.get_path("Data/LevelName").and_then(Tag::as_str),
            Some("harbor")
        );
        assert_eq!(
            level.get_path("Data/version/Id").and_then(Tag::as_i32),
            Some(3218)
        );
        assert!(level.get_path("Data/missing").is_none());
    }

    #[test]
    fn test_with_on_non_compound_is_noop() {
        assert_eq!(Tag::Int(3).with("a", Tag::Byte(1)), Tag::Int(3));
    }

    #[test]
    fn test_bool_maps_to_byte() {
        assert_eq!(Tag::from(true), Tag::Byte(1));
        assert_eq!(Tag::from(false).type_id(), 1);
    }
}
