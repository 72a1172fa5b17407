use std::borrow::Cow;

use crate::codec::Codec;

/// A bucket name bound to the codec for its values.
///
/// Components declare their buckets once, at construction, and address them
/// through these handles inside transactions.
#[derive(Debug, Clone)]
pub struct Bucket<C> {
    name: Cow<'static, str>,
    codec: C,
}

impl<C: Codec> Bucket<C> {
    pub fn new(name: impl Into<Cow<'static, str>>, codec: C) -> Self {
        Self {
            name: name.into(),
            codec,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }
}
