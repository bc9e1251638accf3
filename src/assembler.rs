//! Reassembly of fragmented WebSocket messages.

use crate::transport::WsFrame;

/// Buffers non-final fragments per kind (text/binary) and emits the
/// complete message when the final fragment arrives. A single final
/// fragment with nothing buffered passes straight through.
#[derive(Debug, Default)]
pub struct PartialMessageAssembler {
    text: String,
    binary: Vec<u8>,
}

impl PartialMessageAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one transport frame; returns the complete message when `frame`
    /// finishes one, `None` while a message is still accumulating.
    /// Close frames always pass through.
    pub fn push(&mut self, frame: WsFrame) -> Option<WsFrame> {
        match frame {
            WsFrame::Text { payload, fin: true } if self.text.is_empty() => {
                Some(WsFrame::text(payload))
            }
            WsFrame::Text { payload, fin } => {
                self.text.push_str(&payload);
                if fin {
                    Some(WsFrame::text(std::mem::take(&mut self.text)))
                } else {
                    None
                }
            }
            WsFrame::Binary { payload, fin: true } if self.binary.is_empty() => {
                Some(WsFrame::binary(payload))
            }
            WsFrame::Binary { payload, fin } => {
                self.binary.extend_from_slice(&payload);
                if fin {
                    Some(WsFrame::binary(std::mem::take(&mut self.binary)))
                } else {
                    None
                }
            }
            close @ WsFrame::Close { .. } => Some(close),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(payload: &str, fin: bool) -> WsFrame {
        WsFrame::Text {
            payload: payload.to_string(),
            fin,
        }
    }

    #[test]
    fn fragments_reassemble_in_order() {
        let mut asm = PartialMessageAssembler::new();
        assert_eq!(asm.push(text("a", false)), None);
        assert_eq!(asm.push(text("b", false)), None);
        assert_eq!(asm.push(text("c", true)), Some(WsFrame::text("abc")));
    }

    #[test]
    fn single_final_fragment_passes_through() {
        let mut asm = PartialMessageAssembler::new();
        assert_eq!(asm.push(text("whole", true)), Some(WsFrame::text("whole")));
    }

    #[test]
    fn binary_and_text_accumulate_independently() {
        let mut asm = PartialMessageAssembler::new();
        assert_eq!(
            asm.push(WsFrame::Binary {
                payload: vec![1, 2],
                fin: false
            }),
            None
        );
        // interleaved complete text message does not disturb the binary buffer
        assert_eq!(asm.push(text("t", true)), Some(WsFrame::text("t")));
        assert_eq!(
            asm.push(WsFrame::Binary {
                payload: vec![3],
                fin: true
            }),
            Some(WsFrame::binary(vec![1, 2, 3]))
        );
    }

    #[test]
    fn assembler_is_reusable_after_completion() {
        let mut asm = PartialMessageAssembler::new();
        asm.push(text("x", false));
        assert_eq!(asm.push(text("y", true)), Some(WsFrame::text("xy")));
        assert_eq!(asm.push(text("z", true)), Some(WsFrame::text("z")));
    }
}
