//! Types for HTTP response headers

use bytes::Bytes;
use smallvec::SmallVec;

/// Response headers: a name→value mapping with case-insensitive names.
/// Insertion order is irrelevant; setting an existing name replaces it.
#[derive(Default, Clone)]
pub struct Headers {
    headers: SmallVec<[Header; 16]>,
}

#[derive(Clone)]
pub struct Header {
    pub name: String,
    pub value: Bytes,
}

impl Headers {
    /// Set a header, replacing any previous value for that name.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Bytes>) {
        let name = name.into();
        let value = value.into();
        for h in &mut self.headers {
            if h.name.eq_ignore_ascii_case(&name) {
                h.value = value;
                return;
            }
        }
        self.headers.push(Header { name, value });
    }

    pub fn get(&self, name: impl AsRef<str>) -> Option<&[u8]> {
        let name = name.as_ref();
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| &h.value[..])
    }

    pub fn contains(&self, name: impl AsRef<str>) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    pub(crate) fn clear(&mut self) {
        self.headers.clear();
    }
}

impl<'a> IntoIterator for &'a Headers {
    type Item = &'a Header;
    type IntoIter = std::slice::Iter<'a, Header>;

    fn into_iter(self) -> Self::IntoIter {
        self.headers.iter()
    }
}
