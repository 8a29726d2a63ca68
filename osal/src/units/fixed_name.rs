/*
 *   Copyright (c) 2025 R3BL LLC
 *   All rights reserved.
 *
 *   Licensed under the Apache License, Version 2.0 (the "License");
 *   you may not use this file except in compliance with the License.
 *   You may obtain a copy of the License at
 *
 *   http://www.apache.org/licenses/LICENSE-2.0
 *
 *   Unless required by applicable law or agreed to in writing, software
 *   distributed under the License is distributed on an "AS IS" BASIS,
 *   WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *   See the License for the specific language governing permissions and
 *   limitations under the License.
 */

//! Fixed-capacity names for threads, semaphores, queues, and memory regions.
//!
//! Names are compared by value, never by pointer, and never exceed
//! [`MAX_NAME_LENGTH`] bytes. The backing store is a stack allocated
//! [`SmallString`] that can not spill for a valid name.

use std::{fmt, hash::{Hash, Hasher}};

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use smallstr::SmallString;

/// The maximum length in bytes of a thread / semaphore / queue / memory
/// region name.
pub const MAX_NAME_LENGTH: usize = 16;

type NameStorage = SmallString<[u8; MAX_NAME_LENGTH]>;

/// A fixed-capacity, value-compared name.
///
/// Constructing one from a string longer than [`MAX_NAME_LENGTH`] bytes is a
/// contract violation a programmer can fix, so it asserts rather than
/// returning an error.
#[derive(Clone)]
pub struct FixedName {
    storage: NameStorage,
}

impl FixedName {
    /// Create a name from a string of at most [`MAX_NAME_LENGTH`] bytes.
    ///
    /// # Panics
    ///
    /// Panics if `name` is longer than [`MAX_NAME_LENGTH`] bytes.
    #[must_use]
    pub fn new(name: &str) -> Self {
        assert!(
            name.len() <= MAX_NAME_LENGTH,
            "name exceeds {MAX_NAME_LENGTH} bytes: {name:?}"
        );
        Self {
            storage: NameStorage::from_str(name),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str { self.storage.as_str() }

    #[must_use]
    pub fn len(&self) -> usize { self.storage.len() }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.storage.is_empty() }
}

mod adapters {
    use super::*;

    impl PartialEq for FixedName {
        fn eq(&self, other: &Self) -> bool { self.as_str() == other.as_str() }
    }

    impl Eq for FixedName {}

    impl PartialEq<str> for FixedName {
        fn eq(&self, other: &str) -> bool { self.as_str() == other }
    }

    impl Hash for FixedName {
        fn hash<H: Hasher>(&self, state: &mut H) { self.as_str().hash(state); }
    }

    impl From<&str> for FixedName {
        fn from(name: &str) -> Self { FixedName::new(name) }
    }

    impl AsRef<str> for FixedName {
        fn as_ref(&self) -> &str { self.as_str() }
    }

    impl fmt::Debug for FixedName {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "FixedName({:?})", self.as_str())
        }
    }

    impl fmt::Display for FixedName {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}", self.as_str())
        }
    }
}

mod serde_support {
    use super::*;

    impl Serialize for FixedName {
        fn serialize<S: Serializer>(
            &self,
            serializer: S,
        ) -> std::result::Result<S::Ok, S::Error> {
            serializer.serialize_str(self.as_str())
        }
    }

    impl<'de> Deserialize<'de> for FixedName {
        fn deserialize<D: Deserializer<'de>>(
            deserializer: D,
        ) -> std::result::Result<Self, D::Error> {
            let text = String::deserialize(deserializer)?;
            if text.len() > MAX_NAME_LENGTH {
                return Err(de::Error::custom(format!(
                    "name exceeds {MAX_NAME_LENGTH} bytes: {text:?}"
                )));
            }
            Ok(FixedName::new(&text))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_compare_by_value() {
        let lhs = FixedName::new("netWorker");
        let rhs = FixedName::new("netWorker");
        assert_eq!(lhs, rhs);
        assert!(lhs == *"netWorker");
        assert_ne!(lhs, FixedName::new("netWorker2"));
    }

    #[test]
    fn test_sixteen_bytes_is_accepted() {
        let name = FixedName::new("0123456789abcdef");
        assert_eq!(name.len(), MAX_NAME_LENGTH);
    }

    #[test]
    #[should_panic(expected = "name exceeds")]
    fn test_seventeen_bytes_panics() {
        let _name = FixedName::new("0123456789abcdefg");
    }
}
