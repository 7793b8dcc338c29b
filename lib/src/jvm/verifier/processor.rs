use super::*;
use crate::jvm::code::VerifierInstruction;
use crate::util::Offset;

/// Observer of the frames computed by an [`Analyzer`]
///
/// Processors are only ever called after the whole method has been analyzed successfully, once
/// per reachable instruction.
pub trait FrameProcessor {
    fn handle_instruction(
        &mut self,
        offset: Offset,
        insn: &VerifierInstruction,
        before: &Frame,
        after: &Frame,
    );
}

impl<F> FrameProcessor for F
where
    F: FnMut(Offset, &VerifierInstruction, &Frame, &Frame),
{
    fn handle_instruction(
        &mut self,
        offset: Offset,
        insn: &VerifierInstruction,
        before: &Frame,
        after: &Frame,
    ) {
        self(offset, insn, before, after)
    }
}

/// Processor that logs every instruction along with the frames around it
#[derive(Debug, Default)]
pub struct FrameLogger {
    logged: usize,
}

impl FrameLogger {
    pub fn new() -> FrameLogger {
        FrameLogger::default()
    }

    /// Number of instructions logged so far
    pub fn logged(&self) -> usize {
        self.logged
    }
}

impl FrameProcessor for FrameLogger {
    fn handle_instruction(
        &mut self,
        offset: Offset,
        insn: &VerifierInstruction,
        before: &Frame,
        after: &Frame,
    ) {
        self.logged += 1;
        log::debug!("{:>5}: {:?}", offset.0, insn);
        log::debug!("       before {}", before);
        log::debug!("       after  {}", after);
    }
}
