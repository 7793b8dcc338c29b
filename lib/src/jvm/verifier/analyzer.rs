use super::*;
use crate::jvm::code::{
    AnyInstruction, ConstantResolver, ExceptionHandler, InstructionStream, VerifierInstruction,
    MAX_CODE_LENGTH,
};
use crate::jvm::{BinaryName, Error, MethodDescriptor, RefType, RenderDescriptor, UnqualifiedName};
use crate::util::{Offset, Width};
use bitflags::bitflags;

bitflags! {
    /// Facts about an offset in the code, recorded during the analysis
    pub struct OffsetFlags: u8 {
        /// Start of a basic block (method entry, jump target, or exception handler)
        const BLOCK_ENTRY = 0x01;

        /// Branch, switch, return, or throw
        const BLOCK_EXIT = 0x02;

        /// Start of an exception handler
        const EXCEPTION_HANDLER = 0x04;

        /// Target of a jump or switch (not just a fallthrough)
        const JUMP_TARGET = 0x08;
    }
}

/// Method whose body is being analyzed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodContext {
    /// Class declaring the method
    pub owner: BinaryName,
    pub name: UnqualifiedName,
    pub descriptor: MethodDescriptor<BinaryName>,
    pub is_static: bool,
}

impl MethodContext {
    /// Is this an instance initialization method?
    pub fn is_constructor(&self) -> bool {
        self.name == UnqualifiedName::INIT
    }

    /// Frame on entry to the method
    ///
    /// The stack is empty and the locals hold the receiver (for instance methods) followed by the
    /// parameters. In constructors, the receiver starts out uninitialized.
    pub fn initial_frame(&self) -> Frame {
        let mut frame = Frame::new();
        let mut slot: u16 = 0;

        if !self.is_static {
            let owner = RefType::Object(self.owner.clone());
            let receiver = if self.is_constructor() {
                VerificationType::UninitializedThis(owner)
            } else {
                VerificationType::Object(owner)
            };
            frame.store(slot, receiver);
            slot += 1;
        }

        for parameter in &self.descriptor.parameters {
            let typ = VerificationType::from(parameter.clone());
            let width = typ.width() as u16;
            frame.store(slot, typ);
            slot = slot.saturating_add(width);
        }

        frame
    }
}

/// How to compute the frame at the start of a pending block
#[derive(Debug)]
enum FrameSetup {
    /// Frame is already known (method entry, or the frame after a branch)
    Known(Frame),

    /// Frame before the start of the protected range, but with only the exception on the stack
    ExceptionHandler {
        start_pc: Offset,
        catch_type: BinaryName,
    },
}

#[derive(Debug)]
struct PendingBlock {
    offset: Offset,
    setup: FrameSetup,
}

/// Computes the frame before and after every reachable instruction in a method body
///
/// The traversal is a worklist over basic blocks: the first frame to reach an offset is the one
/// used for that offset. Frames from other predecessors are compared against it (and any mismatch
/// logged), but never merged.
pub struct Analyzer<'a> {
    method: &'a MethodContext,
    code: &'a dyn InstructionStream,
    exception_table: &'a [ExceptionHandler],
    constants: &'a dyn ConstantResolver,
    processors: Vec<&'a mut dyn FrameProcessor>,
}

impl<'a> Analyzer<'a> {
    pub fn new(
        method: &'a MethodContext,
        code: &'a dyn InstructionStream,
        exception_table: &'a [ExceptionHandler],
        constants: &'a dyn ConstantResolver,
    ) -> Analyzer<'a> {
        Analyzer {
            method,
            code,
            exception_table,
            constants,
            processors: vec![],
        }
    }

    /// Register a processor to be called on every analyzed instruction
    ///
    /// Processors are called in registration order, once the whole method has been analyzed
    /// successfully. They see instructions block by block, in the order they were evaluated.
    pub fn add_processor(&mut self, processor: &'a mut dyn FrameProcessor) {
        self.processors.push(processor);
    }

    /// Run the analysis
    pub fn analyze(mut self) -> Result<Analysis, Error> {
        log::debug!(
            "Analyzing {}.{}{}",
            self.method.owner,
            self.method.name,
            self.method.descriptor.render()
        );

        let code_length = self.code.code_length();
        if code_length > MAX_CODE_LENGTH {
            return Err(Error::CodeTooLong(code_length));
        }
        if !self.code.is_instruction_start(Offset(0)) {
            return Err(Error::FellOffCode(Offset(0)));
        }

        let mut analysis = Analysis::new(code_length);
        let mut worklist: Vec<PendingBlock> = vec![];

        // Pushed in reverse so that the first handler is popped first
        for handler in self.exception_table.iter().rev() {
            self.validate_handler(handler)?;
            analysis.flags[handler.handler_pc.0] |=
                OffsetFlags::BLOCK_ENTRY | OffsetFlags::EXCEPTION_HANDLER;
            worklist.push(PendingBlock {
                offset: handler.handler_pc,
                setup: FrameSetup::ExceptionHandler {
                    start_pc: handler.start_pc,
                    catch_type: handler.caught_class(),
                },
            });
        }

        analysis.flags[0] |= OffsetFlags::BLOCK_ENTRY;
        worklist.push(PendingBlock {
            offset: Offset(0),
            setup: FrameSetup::Known(self.method.initial_frame()),
        });

        // Handlers whose protected range hasn't been reached yet
        let mut deferred: Vec<PendingBlock> = vec![];

        loop {
            let block = match worklist.pop() {
                Some(block) => block,
                None => {
                    let (ready, waiting): (Vec<_>, Vec<_>) =
                        deferred.into_iter().partition(|block| match &block.setup {
                            FrameSetup::ExceptionHandler { start_pc, .. } => {
                                analysis.frames_before[start_pc.0].is_some()
                            }
                            FrameSetup::Known(_) => true,
                        });
                    if ready.is_empty() {
                        if let Some(PendingBlock {
                            setup: FrameSetup::ExceptionHandler { start_pc, .. },
                            ..
                        }) = waiting.first()
                        {
                            log::error!("Protected range at {} is never reached", start_pc.0);
                            return Err(Error::MissingFrame(*start_pc));
                        }
                        break;
                    }
                    worklist.extend(ready.into_iter().rev());
                    deferred = waiting;
                    continue;
                }
            };

            let frame = match block.setup {
                FrameSetup::Known(frame) => frame,
                FrameSetup::ExceptionHandler {
                    start_pc,
                    catch_type,
                } => match &analysis.frames_before[start_pc.0] {
                    Some(frame) => {
                        let mut frame = frame.clone();
                        frame.enter_exception_handler(catch_type);
                        frame
                    }
                    None => {
                        log::trace!(
                            "Deferring handler at {} until {} is reached",
                            block.offset.0,
                            start_pc.0
                        );
                        deferred.push(PendingBlock {
                            offset: block.offset,
                            setup: FrameSetup::ExceptionHandler {
                                start_pc,
                                catch_type,
                            },
                        });
                        continue;
                    }
                },
            };

            self.evaluate_block(&mut analysis, block.offset, frame, &mut worklist)?;
        }

        // Only publish frames once the whole method is known to be fine
        for offset in &analysis.order {
            let insn = analysis.instructions[offset.0].as_ref();
            let before = analysis.frames_before[offset.0].as_ref();
            let after = analysis.frames_after[offset.0].as_ref();
            match (insn, before, after) {
                (Some(insn), Some(before), Some(after)) => {
                    for processor in self.processors.iter_mut() {
                        processor.handle_instruction(*offset, insn, before, after);
                    }
                }
                _ => return Err(Error::MissingFrame(*offset)),
            }
        }

        log::debug!(
            "Analyzed {} instructions of {}.{} (max stack {}, max locals {})",
            analysis.order.len(),
            self.method.owner,
            self.method.name,
            analysis.max_stack(),
            analysis.max_locals(),
        );
        Ok(analysis)
    }

    fn validate_handler(&self, handler: &ExceptionHandler) -> Result<(), Error> {
        let code_length = self.code.code_length();
        let is_valid = handler.start_pc < handler.end_pc
            && self.code.is_instruction_start(handler.start_pc)
            && (handler.end_pc.0 == code_length || self.code.is_instruction_start(handler.end_pc))
            && self.code.is_instruction_start(handler.handler_pc);
        if is_valid {
            Ok(())
        } else {
            log::error!("Invalid exception handler {:?}", handler);
            Err(Error::InvalidExceptionHandler(handler.clone()))
        }
    }

    /// Evaluate instructions starting at an offset, until the end of the block or until reaching
    /// an already evaluated offset
    fn evaluate_block(
        &self,
        analysis: &mut Analysis,
        start: Offset,
        frame: Frame,
        worklist: &mut Vec<PendingBlock>,
    ) -> Result<(), Error> {
        if analysis.evaluated[start.0] {
            analysis.check_join(start, &frame);
            return Ok(());
        }
        log::trace!("Evaluating block at {}", start.0);
        analysis.frames_before[start.0] = Some(frame);

        let code_length = self.code.code_length();
        let mut offset = start;
        loop {
            analysis.evaluated[offset.0] = true;
            analysis.order.push(offset);

            let (raw_insn, length) = self.code.decode(offset)?;
            let insn = raw_insn.resolve(self.constants).map_err(|kind| {
                log::error!("Failed to resolve operands of {:?} at {}", raw_insn, offset.0);
                Error::UnresolvedConstant { offset, kind }
            })?;

            let before = analysis.frames_before[offset.0]
                .as_ref()
                .ok_or(Error::MissingFrame(offset))?;
            let after = before.after_instruction(&insn, offset).map_err(|kind| {
                log::error!("Invalid {:?} at {} with {}: {:?}", insn, offset.0, before, kind);
                Error::InvariantViolated {
                    offset,
                    instruction: format!("{:?}", insn),
                    kind,
                }
            })?;
            log::trace!("{}: {:?} {} -> {}", offset.0, insn, before, after);

            let next = match &insn {
                AnyInstruction::Branch(branch) => {
                    analysis.flags[offset.0] |= OffsetFlags::BLOCK_EXIT;
                    let fallthrough = branch.fallthrough_target();
                    for target in branch.successors() {
                        if Some(target) == fallthrough {
                            if target.0 >= code_length {
                                log::error!("Branch at {} falls off the end of the code", offset.0);
                                return Err(Error::FellOffCode(offset));
                            }
                        } else if self.code.is_instruction_start(target) {
                            analysis.flags[target.0] |= OffsetFlags::JUMP_TARGET;
                        } else {
                            log::error!("Jump at {} to {} is invalid", offset.0, target.0);
                            return Err(Error::InvalidJumpTarget { offset, target });
                        }
                        self.enqueue(analysis, worklist, target, &after);
                    }
                    None
                }
                AnyInstruction::Regular(_) => {
                    let next = offset + length;
                    if next.0 >= code_length {
                        log::error!("Instruction at {} falls off the end of the code", offset.0);
                        return Err(Error::FellOffCode(offset));
                    }
                    Some(next)
                }
            };

            analysis.instructions[offset.0] = Some(insn);
            match next {
                None => {
                    analysis.frames_after[offset.0] = Some(after);
                    return Ok(());
                }
                Some(next) if analysis.evaluated[next.0] => {
                    analysis.check_join(next, &after);
                    analysis.frames_after[offset.0] = Some(after);
                    return Ok(());
                }
                Some(next) => {
                    analysis.frames_before[next.0] = Some(after.clone());
                    analysis.frames_after[offset.0] = Some(after);
                    offset = next;
                }
            }
        }
    }

    fn enqueue(
        &self,
        analysis: &mut Analysis,
        worklist: &mut Vec<PendingBlock>,
        target: Offset,
        frame: &Frame,
    ) {
        log::trace!("Enqueuing block at {}", target.0);
        analysis.flags[target.0] |= OffsetFlags::BLOCK_ENTRY;
        worklist.push(PendingBlock {
            offset: target,
            setup: FrameSetup::Known(frame.clone()),
        });
    }
}

/// Result of analyzing a method body
///
/// All of the per-offset state is indexed by offset in the code. Offsets that are not the start
/// of a reachable instruction have no frames.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub(super) flags: Vec<OffsetFlags>,
    evaluated: Vec<bool>,
    frames_before: Vec<Option<Frame>>,
    frames_after: Vec<Option<Frame>>,
    instructions: Vec<Option<VerifierInstruction>>,
    order: Vec<Offset>,
}

impl Analysis {
    fn new(code_length: usize) -> Analysis {
        Analysis {
            flags: vec![OffsetFlags::empty(); code_length],
            evaluated: vec![false; code_length],
            frames_before: vec![None; code_length],
            frames_after: vec![None; code_length],
            instructions: vec![None; code_length],
            order: vec![],
        }
    }

    /// Compare a frame reaching an already evaluated offset to the one used there
    fn check_join(&self, offset: Offset, incoming: &Frame) {
        if let Some(existing) = &self.frames_before[offset.0] {
            if existing != incoming {
                log::warn!(
                    "Frames disagree at {}: keeping {} and ignoring {}",
                    offset.0,
                    existing,
                    incoming
                );
            }
        }
    }

    /// Length of the code that was analyzed
    pub fn code_length(&self) -> usize {
        self.evaluated.len()
    }

    pub fn frame_before(&self, offset: Offset) -> Option<&Frame> {
        self.frames_before.get(offset.0).and_then(Option::as_ref)
    }

    pub fn frame_after(&self, offset: Offset) -> Option<&Frame> {
        self.frames_after.get(offset.0).and_then(Option::as_ref)
    }

    /// Resolved instruction at an offset (if it was reached)
    pub fn instruction(&self, offset: Offset) -> Option<&VerifierInstruction> {
        self.instructions.get(offset.0).and_then(Option::as_ref)
    }

    pub fn flags(&self, offset: Offset) -> OffsetFlags {
        self.flags
            .get(offset.0)
            .copied()
            .unwrap_or_else(OffsetFlags::empty)
    }

    pub fn is_evaluated(&self, offset: Offset) -> bool {
        self.evaluated.get(offset.0).copied().unwrap_or(false)
    }

    /// Offsets in the order they were evaluated
    pub fn order(&self) -> &[Offset] {
        &self.order
    }

    /// Evaluated offsets, in ascending order
    pub fn evaluated_offsets(&self) -> impl Iterator<Item = Offset> + '_ {
        self.evaluated
            .iter()
            .enumerate()
            .filter(|(_, evaluated)| **evaluated)
            .map(|(offset, _)| Offset(offset))
    }

    /// Largest stack size (in words) over all frames
    pub fn max_stack(&self) -> usize {
        self.frames()
            .map(|frame| frame.stack_size())
            .max()
            .unwrap_or(0)
    }

    /// Largest number of local slots over all frames
    pub fn max_locals(&self) -> usize {
        self.frames()
            .map(|frame| frame.locals_size())
            .max()
            .unwrap_or(0)
    }

    fn frames(&self) -> impl Iterator<Item = &Frame> {
        self.frames_before
            .iter()
            .chain(self.frames_after.iter())
            .flatten()
    }
}
