use core::{
    pin::Pin,
    task::{Context, Poll, ready},
};

use bytes_utils::Str;
use futures_core::Stream;

use crate::{
    accumulator::ItemAccumulator, decoder::Decoder, errors::ItemStreamError,
    tokenizer::LineTokenizer,
};

#[derive(Debug, Clone, Copy)]
enum ItemStreamState {
    Active,
    Terminated,
}

impl ItemStreamState {
    fn is_terminated(&self) -> bool {
        matches!(self, Self::Terminated)
    }
}

pin_project_lite::pin_project! {
    /// Converts a stream of body chunks into a stream of items.
    ///
    /// The first error ends the stream, and bytes after the last delimiter are dropped when the inner stream finishes
    /// since nothing confirmed them as a complete item.
    #[derive(Debug)]
    pub struct ItemStream<S> {
        #[pin]
        stream: S,
        accumulator: ItemAccumulator,
        state: ItemStreamState,
    }
}

impl<S> ItemStream<S> {
    /// Items split on `\r` from an unencoded body
    pub fn new(stream: S) -> Self {
        Self::with_accumulator(stream, ItemAccumulator::default())
    }

    pub fn with_decoder(stream: S, decoder: Decoder) -> Self {
        Self::with_accumulator(stream, ItemAccumulator::with_decoder(decoder))
    }

    pub fn with_accumulator(stream: S, accumulator: ItemAccumulator) -> Self {
        Self {
            stream,
            accumulator,
            state: ItemStreamState::Active,
        }
    }

    /// Like [`with_decoder`][Self::with_decoder] with a custom tokenizer
    pub fn with_parts(stream: S, decoder: Decoder, tokenizer: LineTokenizer) -> Self {
        Self::with_accumulator(stream, ItemAccumulator::new(decoder, tokenizer))
    }

    pub fn accumulator(&self) -> &ItemAccumulator {
        &self.accumulator
    }
}

impl<S, E, B> Stream for ItemStream<S>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
{
    type Item = Result<Str, ItemStreamError<E>>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        if this.state.is_terminated() {
            return Poll::Ready(None);
        }

        loop {
            match this.accumulator.next_item() {
                Ok(Some(item)) => return Poll::Ready(Some(Ok(item))),
                Ok(None) => {}
                Err(e) => {
                    *this.state = ItemStreamState::Terminated;
                    return Poll::Ready(Some(Err(e.into())));
                }
            }

            let new_bytes = match ready!(this.stream.as_mut().poll_next(cx)) {
                Some(Ok(o)) => o,
                Some(Err(e)) => {
                    *this.state = ItemStreamState::Terminated;
                    return Poll::Ready(Some(Err(ItemStreamError::Transport(e))));
                }
                None => {
                    *this.state = ItemStreamState::Terminated;
                    if !this.accumulator.pending().is_empty() {
                        tracing::debug!(
                            bytes = this.accumulator.pending().len(),
                            "dropping unterminated item at end of stream"
                        );
                    }
                    return Poll::Ready(None);
                }
            };

            let new_bytes = new_bytes.as_ref();

            if new_bytes.is_empty() {
                continue;
            }

            this.accumulator.feed(new_bytes);
        }
    }
}
