//! Frame I/O over async streams.
//!
//! [`FrameReader`] decodes frames off the read half of a stream and
//! [`FrameWriter`] encodes them onto the write half, each for one [`Role`].
//! Both take their per-operation deadlines from a shared [`DeadlineHandle`].
//! The `head` module reads the HTTP head of the opening handshake off the
//! stream before it is split.
//!
//! [`Role`]: crate::Role

#[cfg(feature = "async-tokio")]
mod deadline;
#[cfg(feature = "async-tokio")]
mod framed;
#[cfg(feature = "async-tokio")]
pub(crate) mod head;
#[cfg(all(test, feature = "async-tokio"))]
pub(crate) mod mock;

#[cfg(feature = "async-tokio")]
pub use deadline::DeadlineHandle;
#[cfg(feature = "async-tokio")]
pub use framed::{FrameReader, FrameWriter};
