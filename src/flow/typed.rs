use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::Result;

use super::{Flow, InvokeOptions};

/// A [`Flow`] with Rust types on both ends.
///
/// Input is serialized to JSON before validation; the validated output is
/// deserialized into `O`. Conversion failures surface as
/// [`Error::Serialization`](crate::Error::Serialization).
pub struct TypedFlow<I, O> {
    flow: Arc<Flow>,
    _types: PhantomData<fn(&I) -> O>,
}

impl<I, O> TypedFlow<I, O>
where
    I: Serialize,
    O: DeserializeOwned,
{
    pub fn new(flow: Arc<Flow>) -> Self {
        Self {
            flow,
            _types: PhantomData,
        }
    }

    pub fn flow(&self) -> &Flow {
        &self.flow
    }

    pub async fn invoke(&self, input: &I) -> Result<O> {
        self.invoke_with(input, InvokeOptions::default()).await
    }

    pub async fn invoke_with(&self, input: &I, options: InvokeOptions) -> Result<O> {
        let value = serde_json::to_value(input)?;
        let output = self.flow.invoke_with(value, options).await?;
        Ok(serde_json::from_value(output)?)
    }
}

impl<I, O> Clone for TypedFlow<I, O> {
    fn clone(&self) -> Self {
        Self {
            flow: Arc::clone(&self.flow),
            _types: PhantomData,
        }
    }
}

impl<I, O> fmt::Debug for TypedFlow<I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedFlow")
            .field("flow", &self.flow.name())
            .finish()
    }
}
