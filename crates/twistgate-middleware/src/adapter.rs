//! The input adapter seam.
//!
//! The gate never speaks a transport protocol.  Adapters decode whatever the
//! outside world sends into [`Fragment`]s and hand them over as a stream; the
//! runtime pumps each stream into the arbiter in arrival order.
//!
//! - [`FragmentSource`] – the trait every input adapter implements.
//! - [`JsonLinesSource`][crate::json_lines::JsonLinesSource] – newline-
//!   delimited JSON from any async reader (stdin, a socket, a file).

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use twistgate_types::Fragment;

/// Every input adapter must implement this trait.
///
/// # Contract
///
/// * `name` – stable label used in logs.
/// * `fragments` – a stream of decoded fragments in arrival order.  The
///   stream ends when the underlying transport closes.  Undecodable input is
///   the adapter's business: log it and keep going.
#[async_trait]
pub trait FragmentSource: Send {
    fn name(&self) -> &str;

    /// Consume the adapter's input and yield decoded fragments.
    async fn fragments(self: Box<Self>) -> BoxStream<'static, Fragment>;
}
