//! Schema-dispatching decoders for `application/x-ndjson` bodies.

use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;

use tokio_util::sync::CancellationToken;

use crate::http_client::ResponseBody;
use crate::iter::{Iter, IterError, JsonIter};
use crate::records::{
    ProvideResult, ProviderRecord, SchemaDispatch, UnknownProviderRecord, WriteProviderRecord,
};

/// Pulls envelopes from a JSON stream and re-decodes each one by schema.
///
/// A record with a known schema that fails to decode ends the iteration and
/// closes the stream.
pub struct SchemaDispatchIter<T> {
    inner: JsonIter<UnknownProviderRecord>,
    done: bool,
    _marker: PhantomData<fn() -> T>,
}

/// Provider records streamed back from a lookup.
pub type ReadProvidersResponseIter = SchemaDispatchIter<ProviderRecord>;
/// Provider records streamed in a provide request (server side).
pub type WriteProvidersRequestIter = SchemaDispatchIter<WriteProviderRecord>;
/// Per-record results streamed back from a provide.
pub type WriteProvidersResponseIter = SchemaDispatchIter<ProvideResult>;

impl<T: SchemaDispatch> SchemaDispatchIter<T> {
    pub fn new(body: ResponseBody, cancel: CancellationToken) -> Self {
        Self {
            inner: JsonIter::new(body, cancel),
            done: false,
            _marker: PhantomData,
        }
    }

    async fn next_record(&mut self) -> Option<Result<T, IterError>> {
        if self.done {
            return None;
        }

        let envelope = match self.inner.next().await {
            Some(Ok(envelope)) => envelope,
            Some(Err(error)) => {
                self.done = true;
                return Some(Err(error));
            }
            None => {
                self.done = true;
                return None;
            }
        };

        let schema = envelope.schema.clone();
        match T::from_envelope(envelope) {
            Ok(record) => Some(Ok(record)),
            Err(source) => {
                self.done = true;
                self.inner.release();
                Some(Err(IterError::Schema { schema, source }))
            }
        }
    }
}

impl<T> Iter<T> for SchemaDispatchIter<T>
where
    T: SchemaDispatch + Send,
{
    fn next<'a>(
        &'a mut self,
    ) -> Pin<Box<dyn Future<Output = Option<Result<T, IterError>>> + Send + 'a>> {
        Box::pin(self.next_record())
    }
}

pub fn read_providers_response_iter(
    body: ResponseBody,
    cancel: CancellationToken,
) -> ReadProvidersResponseIter {
    SchemaDispatchIter::new(body, cancel)
}

pub fn write_providers_request_iter(
    body: ResponseBody,
    cancel: CancellationToken,
) -> WriteProvidersRequestIter {
    SchemaDispatchIter::new(body, cancel)
}

pub fn write_providers_response_iter(
    body: ResponseBody,
    cancel: CancellationToken,
) -> WriteProvidersResponseIter {
    SchemaDispatchIter::new(body, cancel)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::iter::read_all;

    #[tokio::test]
    async fn dispatches_each_line_by_schema() {
        let body = ResponseBody::from_bytes(concat!(
            "{\"Schema\":\"bitswap/transport\",\"Protocol\":\"transport-bitswap\",\"Addrs\":[]}\n",
            "{\"Schema\":\"graphsync/v9\",\"Protocol\":\"gs\",\"Extra\":true}\n",
        ));
        let mut iter = read_providers_response_iter(body, CancellationToken::new());

        let records = read_all(&mut iter).await.expect("decode");
        assert_eq!(records.len(), 2);
        assert!(matches!(records[0], ProviderRecord::Bitswap(_)));
        match &records[1] {
            ProviderRecord::Unknown(unknown) => {
                assert_eq!(unknown.schema, "graphsync/v9");
                assert_eq!(
                    unknown.raw(),
                    "{\"Schema\":\"graphsync/v9\",\"Protocol\":\"gs\",\"Extra\":true}"
                );
            }
            other => panic!("unexpected variant {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_known_schema_ends_iteration() {
        let body = ResponseBody::from_bytes(concat!(
            "{\"Schema\":\"bitswap/transport\",\"AdvisoryTTL\":\"soon\"}\n",
            "{\"Schema\":\"bitswap/transport\",\"AdvisoryTTL\":\"1h\"}\n",
        ));
        let mut iter = write_providers_response_iter(body, CancellationToken::new());

        let error = iter.next().await.expect("terminal").expect_err("bad ttl");
        assert!(matches!(
            error,
            IterError::Schema { ref schema, .. } if schema == "bitswap/transport"
        ));
        assert!(iter.next().await.is_none());
    }

    #[tokio::test]
    async fn provide_results_stream_decodes_ttl() {
        let body = ResponseBody::from_bytes(
            "{\"Schema\":\"bitswap/transport\",\"AdvisoryTTL\":\"90s\"}\n",
        );
        let mut iter = write_providers_response_iter(body, CancellationToken::new());

        match iter.next().await {
            Some(Ok(ProvideResult::Bitswap(result))) => assert_eq!(
                result.advisory_ttl.map(|ttl| ttl.as_duration()),
                Some(Duration::from_secs(90))
            ),
            other => panic!("unexpected {other:?}"),
        }
        assert!(iter.next().await.is_none());
    }

    #[tokio::test]
    async fn write_request_stream_yields_unknown_records_verbatim() {
        let body = ResponseBody::from_bytes("{\"Schema\":\"other\",\"Payload\":{}}\n");
        let mut iter = write_providers_request_iter(body, CancellationToken::new());

        let records = read_all(&mut iter).await.expect("decode");
        assert_eq!(
            records,
            vec![WriteProviderRecord::Unknown(
                serde_json::from_str("{\"Schema\":\"other\",\"Payload\":{}}").expect("envelope")
            )]
        );
    }
}
