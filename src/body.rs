use crate::codec;
use bytes::{Buf, Bytes, BytesMut};
use compression_codecs::EncodeV2;
use compression_codecs::gzip::GzipEncoder;
use compression_core::Level;
use compression_core::util::{PartialBuffer, WriteBuffer};
use http::HeaderMap;
use http_body::{Body, Frame, SizeHint};
use pin_project_lite::pin_project;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

const OUTPUT_BUFFER_SIZE: usize = 8 * 1024; // 8KB output buffer

pin_project! {
    /// A response body that may be gzip compressed.
    ///
    /// Which variant a response gets is decided once, from the first chunk
    /// of body data, and never changes afterwards.
    #[project = CompressionBodyProj]
    #[allow(missing_docs)]
    pub enum CompressionBody<B> {
        /// Every data frame goes through a gzip encoder.
        Compressed {
            #[pin]
            inner: B,
            state: CompressedBody,
        },
        /// Frames are forwarded unchanged.
        Passthrough {
            #[pin]
            inner: B,
            head: Option<Head>,
        },
    }
}

/// A frame taken from the inner body before the response head was released.
#[derive(Debug)]
pub(crate) enum Head {
    Data(Bytes),
    Trailers(HeaderMap),
    Error(io::Error),
    /// The inner body is exhausted.
    End,
}

/// State and buffers for an actively compressed body.
pub(crate) struct CompressedBody {
    encoder: GzipEncoder,
    output_buffer: Vec<u8>,
    state: CompressState,
    pending_input: Option<Bytes>,
    pending_trailers: Option<HeaderMap>,
}

/// State machine for compression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CompressState {
    /// Reading data from inner body and compressing.
    Reading,
    /// Finishing compression after inner body is done.
    Finishing,
    /// Emitting buffered trailers.
    Trailers,
    /// Compression is complete, or was abandoned after an error.
    Done,
}

impl CompressedBody {
    /// Creates a compressor whose first input is the chunk that triggered the decision.
    fn new(first: Bytes, level: Level) -> Self {
        Self {
            encoder: codec::encoder(level),
            output_buffer: vec![0u8; OUTPUT_BUFFER_SIZE],
            state: CompressState::Reading,
            pending_input: Some(first),
            pending_trailers: None,
        }
    }

    /// Returns the current compression state.
    pub(crate) fn state(&self) -> CompressState {
        self.state
    }

    /// Polls the inner body and compresses data.
    fn poll_compressed<B>(
        &mut self,
        cx: &mut Context<'_>,
        mut inner: Pin<&mut B>,
    ) -> Poll<Option<Result<Frame<Bytes>, io::Error>>>
    where
        B: Body,
        B::Data: Buf,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        loop {
            match self.state {
                CompressState::Done => return Poll::Ready(None),

                CompressState::Trailers => {
                    self.state = CompressState::Done;
                    return match self.pending_trailers.take() {
                        Some(trailers) => Poll::Ready(Some(Ok(Frame::trailers(trailers)))),
                        None => Poll::Ready(None),
                    };
                }

                CompressState::Finishing => {
                    let mut output =
                        WriteBuffer::new_initialized(self.output_buffer.as_mut_slice());

                    match self.encoder.finish(&mut output) {
                        Ok(done) => {
                            let written = output.written_len();
                            if done {
                                self.state = if self.pending_trailers.is_some() {
                                    CompressState::Trailers
                                } else {
                                    CompressState::Done
                                };
                            }
                            if written > 0 {
                                let data = Bytes::copy_from_slice(&self.output_buffer[..written]);
                                return Poll::Ready(Some(Ok(Frame::data(data))));
                            }
                        }
                        Err(e) => {
                            self.state = CompressState::Done;
                            return Poll::Ready(Some(Err(e)));
                        }
                    }
                }

                CompressState::Reading => {
                    if let Some(input) = self.pending_input.take() {
                        if let Some(frame) = self.encode_frame(&input) {
                            return Poll::Ready(Some(frame));
                        }
                        continue;
                    }

                    match inner.as_mut().poll_frame(cx) {
                        Poll::Pending => return Poll::Pending,
                        Poll::Ready(None) => {
                            self.state = CompressState::Finishing;
                        }
                        Poll::Ready(Some(Err(e))) => {
                            // The partial body is unrecoverable; the encoder is
                            // released with the body.
                            self.state = CompressState::Done;
                            return Poll::Ready(Some(Err(io::Error::other(e.into()))));
                        }
                        Poll::Ready(Some(Ok(frame))) => match frame.into_data() {
                            Ok(data) => {
                                if let Some(frame) = self.encode_frame(&into_bytes(data)) {
                                    return Poll::Ready(Some(frame));
                                }
                            }
                            Err(frame) => {
                                if let Ok(trailers) = frame.into_trailers() {
                                    // Trailers go out after the gzip tail
                                    self.pending_trailers = Some(trailers);
                                    self.state = CompressState::Finishing;
                                }
                            }
                        },
                    }
                }
            }
        }
    }

    /// Compresses one chunk, returning `None` if the encoder produced no output yet.
    fn encode_frame(&mut self, input: &[u8]) -> Option<Result<Frame<Bytes>, io::Error>> {
        match self.compress_chunk(input) {
            Ok(output) if output.is_empty() => None,
            Ok(output) => Some(Ok(Frame::data(output))),
            Err(e) => {
                self.state = CompressState::Done;
                Some(Err(e))
            }
        }
    }

    /// Feeds a chunk of input to the encoder and collects whatever it emits.
    fn compress_chunk(&mut self, input: &[u8]) -> io::Result<Bytes> {
        // Empty writes are no-ops, the encoder rejects empty input
        if input.is_empty() {
            return Ok(Bytes::new());
        }

        let mut input_buf = PartialBuffer::new(input);
        let mut all_output = BytesMut::new();

        // Keep encoding until all input is consumed
        loop {
            let mut output = WriteBuffer::new_initialized(self.output_buffer.as_mut_slice());

            self.encoder.encode(&mut input_buf, &mut output)?;

            let written = output.written_len();
            if written > 0 {
                all_output.extend_from_slice(&self.output_buffer[..written]);
            }

            if input_buf.written_len() >= input.len() {
                break;
            }

            // Safety check to prevent infinite loop
            if written == 0 && input_buf.written_len() == 0 {
                break;
            }
        }

        Ok(all_output.freeze())
    }
}

impl<B> CompressionBody<B> {
    /// Creates a gzip compressed body, `first` being data already taken from `inner`.
    pub(crate) fn compressed(inner: B, first: Bytes, level: Level) -> Self {
        Self::Compressed {
            inner,
            state: CompressedBody::new(first, level),
        }
    }

    /// Creates a passthrough body without compression.
    pub(crate) fn passthrough(inner: B) -> Self {
        Self::Passthrough { inner, head: None }
    }

    /// Creates a passthrough body that emits `head` before polling `inner`.
    pub(crate) fn replay(inner: B, head: Head) -> Self {
        Self::Passthrough {
            inner,
            head: Some(head),
        }
    }

    /// Returns true if this body is being compressed.
    pub fn is_compressed(&self) -> bool {
        matches!(self, CompressionBody::Compressed { .. })
    }
}

impl<B> Body for CompressionBody<B>
where
    B: Body,
    B::Data: Buf,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    type Data = Bytes;
    type Error = io::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        match self.project() {
            CompressionBodyProj::Passthrough { inner, head } => {
                if let Some(taken) = head.take() {
                    return match taken {
                        Head::Data(data) => Poll::Ready(Some(Ok(Frame::data(data)))),
                        Head::Trailers(trailers) => {
                            *head = Some(Head::End);
                            Poll::Ready(Some(Ok(Frame::trailers(trailers))))
                        }
                        Head::Error(e) => {
                            *head = Some(Head::End);
                            Poll::Ready(Some(Err(e)))
                        }
                        Head::End => {
                            *head = Some(Head::End);
                            Poll::Ready(None)
                        }
                    };
                }

                match inner.poll_frame(cx) {
                    Poll::Pending => Poll::Pending,
                    Poll::Ready(None) => Poll::Ready(None),
                    Poll::Ready(Some(Ok(frame))) => Poll::Ready(Some(Ok(frame.map_data(into_bytes)))),
                    Poll::Ready(Some(Err(e))) => Poll::Ready(Some(Err(io::Error::other(e.into())))),
                }
            }
            CompressionBodyProj::Compressed { inner, state } => state.poll_compressed(cx, inner),
        }
    }

    fn is_end_stream(&self) -> bool {
        match self {
            CompressionBody::Passthrough { inner, head } => match head {
                Some(Head::End) => true,
                Some(_) => false,
                None => inner.is_end_stream(),
            },
            CompressionBody::Compressed { state, .. } => state.state() == CompressState::Done,
        }
    }

    fn size_hint(&self) -> SizeHint {
        match self {
            CompressionBody::Passthrough { inner, head } => match head {
                Some(Head::End) => SizeHint::with_exact(0),
                Some(Head::Data(data)) => {
                    let extra = data.len() as u64;
                    let mut hint = inner.size_hint();
                    if let Some(upper) = hint.upper() {
                        hint.set_upper(upper + extra);
                    }
                    hint.set_lower(hint.lower() + extra);
                    hint
                }
                _ => inner.size_hint(),
            },
            // Compressed size is unknown
            CompressionBody::Compressed { .. } => SizeHint::default(),
        }
    }
}

/// Flattens a possibly segmented buffer into `Bytes`.
pub(crate) fn into_bytes<D: Buf>(mut data: D) -> Bytes {
    data.copy_to_bytes(data.remaining())
}
