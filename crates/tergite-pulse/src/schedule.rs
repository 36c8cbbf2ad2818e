//! Schedule blocks and timed schedules.
//!
//! A [`ScheduleBlock`] is an ordered, possibly parameterized list of channel
//! instructions. Binding it yields a [`Schedule`] where every instruction has
//! a start time `t0` in samples. Instructions are placed as soon as their
//! channel is free (left alignment); a block appended to a schedule starts
//! after everything already scheduled on the channels it touches.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::channel::{Channel, MemorySlot};
use crate::error::PulseResult;
use crate::parameter::{Bindings, ParameterExpr};
use crate::pulse::{Pulse, PulseShape};

/// One instruction of a schedule template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum BlockInstruction {
    /// Set the carrier frequency of a channel, in Hz.
    SetFrequency {
        /// Frequency in Hz.
        frequency: ParameterExpr,
        /// Target channel.
        channel: Channel,
    },
    /// Advance the carrier phase of a channel.
    ShiftPhase {
        /// Phase in radians.
        phase: ParameterExpr,
        /// Target channel.
        channel: Channel,
    },
    /// Play an envelope.
    Play {
        /// The envelope.
        pulse: PulseShape,
        /// Target channel.
        channel: Channel,
        /// Optional label.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        label: Option<String>,
    },
    /// Idle a channel.
    Delay {
        /// Duration in samples.
        duration: ParameterExpr,
        /// Target channel.
        channel: Channel,
        /// Optional label.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        label: Option<String>,
    },
    /// Record the signal on an acquire channel into a memory slot.
    Acquire {
        /// Integration window in samples.
        duration: ParameterExpr,
        /// Acquire channel.
        channel: Channel,
        /// Destination slot.
        slot: MemorySlot,
        /// Optional label.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        label: Option<String>,
    },
}

impl BlockInstruction {
    /// Channel the instruction occupies.
    pub fn channel(&self) -> Channel {
        match self {
            BlockInstruction::SetFrequency { channel, .. }
            | BlockInstruction::ShiftPhase { channel, .. }
            | BlockInstruction::Play { channel, .. }
            | BlockInstruction::Delay { channel, .. }
            | BlockInstruction::Acquire { channel, .. } => *channel,
        }
    }

    fn collect_parameters(&self, names: &mut BTreeSet<String>) {
        match self {
            BlockInstruction::SetFrequency { frequency: e, .. }
            | BlockInstruction::ShiftPhase { phase: e, .. }
            | BlockInstruction::Delay { duration: e, .. }
            | BlockInstruction::Acquire { duration: e, .. } => e.collect_parameters(names),
            BlockInstruction::Play { pulse, .. } => {
                for e in pulse.expressions() {
                    e.collect_parameters(names);
                }
            }
        }
    }

    /// Resolve the instruction against concrete parameter values.
    pub fn bind(&self, bindings: &Bindings, block: &str) -> PulseResult<Instruction> {
        Ok(match self {
            BlockInstruction::SetFrequency { frequency, channel } => Instruction::SetFrequency {
                frequency: frequency.evaluate(bindings)?,
                channel: *channel,
            },
            BlockInstruction::ShiftPhase { phase, channel } => Instruction::ShiftPhase {
                phase: phase.evaluate(bindings)?,
                channel: *channel,
            },
            BlockInstruction::Play {
                pulse,
                channel,
                label,
            } => Instruction::Play {
                pulse: pulse.bind(bindings, label.as_deref().unwrap_or(block))?,
                channel: *channel,
                label: label.clone(),
            },
            BlockInstruction::Delay {
                duration,
                channel,
                label,
            } => Instruction::Delay {
                duration: duration
                    .evaluate_samples(bindings, label.as_deref().unwrap_or(block))?,
                channel: *channel,
                label: label.clone(),
            },
            BlockInstruction::Acquire {
                duration,
                channel,
                slot,
                label,
            } => Instruction::Acquire {
                duration: duration
                    .evaluate_samples(bindings, label.as_deref().unwrap_or(block))?,
                channel: *channel,
                slot: *slot,
                label: label.clone(),
            },
        })
    }
}

/// A concrete instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Instruction {
    /// Set the carrier frequency, in Hz.
    SetFrequency {
        /// Frequency in Hz.
        frequency: f64,
        /// Target channel.
        channel: Channel,
    },
    /// Advance the carrier phase.
    ShiftPhase {
        /// Phase in radians.
        phase: f64,
        /// Target channel.
        channel: Channel,
    },
    /// Play an envelope.
    Play {
        /// The envelope.
        pulse: Pulse,
        /// Target channel.
        channel: Channel,
        /// Optional label.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        label: Option<String>,
    },
    /// Idle a channel.
    Delay {
        /// Duration in samples.
        duration: u64,
        /// Target channel.
        channel: Channel,
        /// Optional label.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        label: Option<String>,
    },
    /// Acquisition into a memory slot.
    Acquire {
        /// Integration window in samples.
        duration: u64,
        /// Acquire channel.
        channel: Channel,
        /// Destination slot.
        slot: MemorySlot,
        /// Optional label.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        label: Option<String>,
    },
}

impl Instruction {
    /// Channel the instruction occupies.
    pub fn channel(&self) -> Channel {
        match self {
            Instruction::SetFrequency { channel, .. }
            | Instruction::ShiftPhase { channel, .. }
            | Instruction::Play { channel, .. }
            | Instruction::Delay { channel, .. }
            | Instruction::Acquire { channel, .. } => *channel,
        }
    }

    /// Duration in samples. Frequency and phase updates take no time.
    pub fn duration(&self) -> u64 {
        match self {
            Instruction::SetFrequency { .. } | Instruction::ShiftPhase { .. } => 0,
            Instruction::Play { pulse, .. } => pulse.duration(),
            Instruction::Delay { duration, .. } | Instruction::Acquire { duration, .. } => {
                *duration
            }
        }
    }
}

/// A parameterized schedule template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleBlock {
    /// Block name.
    pub name: String,
    /// Instructions in program order.
    pub instructions: Vec<BlockInstruction>,
}

impl ScheduleBlock {
    /// Create an empty block.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instructions: Vec::new(),
        }
    }

    /// Append an instruction.
    pub fn push(&mut self, instruction: BlockInstruction) -> &mut Self {
        self.instructions.push(instruction);
        self
    }

    /// Builder-style append.
    #[must_use]
    pub fn with(mut self, instruction: BlockInstruction) -> Self {
        self.instructions.push(instruction);
        self
    }

    /// Append every instruction of another block.
    pub fn extend(&mut self, other: ScheduleBlock) -> &mut Self {
        self.instructions.extend(other.instructions);
        self
    }

    /// Whether the block has no instructions.
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Names of all free parameters.
    pub fn parameters(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        for inst in &self.instructions {
            inst.collect_parameters(&mut names);
        }
        names
    }

    /// Channels used by the block.
    pub fn channels(&self) -> BTreeSet<Channel> {
        self.instructions.iter().map(BlockInstruction::channel).collect()
    }

    /// Bind parameters and lay the instructions out in time.
    pub fn bind(&self, bindings: &Bindings) -> PulseResult<Schedule> {
        let mut schedule = Schedule::new(self.name.clone());
        for inst in &self.instructions {
            let bound = inst.bind(bindings, &self.name)?;
            schedule.push_asap(bound);
        }
        Ok(schedule)
    }
}

/// An instruction with a start time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedInstruction {
    /// Start time in samples.
    pub t0: u64,
    /// The instruction.
    pub instruction: Instruction,
}

/// A schedule with concrete start times.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Schedule {
    /// Schedule name.
    pub name: String,
    instructions: Vec<TimedInstruction>,
    #[serde(skip)]
    channel_end: FxHashMap<Channel, u64>,
}

impl Schedule {
    /// Create an empty schedule.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instructions: Vec::new(),
            channel_end: FxHashMap::default(),
        }
    }

    /// Timed instructions in insertion order.
    pub fn instructions(&self) -> &[TimedInstruction] {
        &self.instructions
    }

    /// End time of the last instruction on a channel.
    pub fn channel_end(&self, channel: Channel) -> u64 {
        self.channel_end.get(&channel).copied().unwrap_or(0)
    }

    /// Total duration in samples.
    pub fn duration(&self) -> u64 {
        self.channel_end.values().copied().max().unwrap_or(0)
    }

    /// Channels used by the schedule, in sorted order.
    pub fn channels(&self) -> BTreeSet<Channel> {
        self.instructions
            .iter()
            .map(|t| t.instruction.channel())
            .collect()
    }

    /// Highest memory slot written by an acquisition.
    pub fn max_memory_slot(&self) -> Option<u32> {
        self.instructions
            .iter()
            .filter_map(|t| match &t.instruction {
                Instruction::Acquire { slot, .. } => Some(slot.0),
                _ => None,
            })
            .max()
    }

    /// Whether the schedule is empty.
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Insert an instruction at an explicit start time.
    pub fn insert(&mut self, t0: u64, instruction: Instruction) {
        let end = t0 + instruction.duration();
        let slot = self.channel_end.entry(instruction.channel()).or_insert(0);
        *slot = (*slot).max(end);
        self.instructions.push(TimedInstruction { t0, instruction });
    }

    /// Place an instruction as soon as its channel is free.
    pub fn push_asap(&mut self, instruction: Instruction) {
        let t0 = self.channel_end(instruction.channel());
        self.insert(t0, instruction);
    }

    /// Append another schedule after everything on the channels it shares with this one.
    pub fn append(&mut self, other: &Schedule) {
        let start = other
            .channels()
            .into_iter()
            .map(|ch| self.channel_end(ch))
            .max()
            .unwrap_or(0);
        for timed in &other.instructions {
            self.insert(start + timed.t0, timed.instruction.clone());
        }
    }

    /// Bring the listed channels to a common end time.
    pub fn align(&mut self, channels: &[Channel]) {
        let end = channels
            .iter()
            .map(|ch| self.channel_end(*ch))
            .max()
            .unwrap_or(0);
        for ch in channels {
            self.channel_end.insert(*ch, end);
        }
    }

    /// Instructions grouped by channel, each in time order.
    pub fn by_channel(&self) -> BTreeMap<Channel, Vec<&TimedInstruction>> {
        let mut grouped: BTreeMap<Channel, Vec<&TimedInstruction>> = BTreeMap::new();
        for timed in &self.instructions {
            grouped
                .entry(timed.instruction.channel())
                .or_default()
                .push(timed);
        }
        for list in grouped.values_mut() {
            list.sort_by_key(|t| t.t0);
        }
        grouped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn play(duration: f64, channel: Channel) -> BlockInstruction {
        BlockInstruction::Play {
            pulse: PulseShape::Constant {
                duration: duration.into(),
                amp: 0.1.into(),
            },
            channel,
            label: None,
        }
    }

    #[test]
    fn test_left_alignment_per_channel() {
        let block = ScheduleBlock::new("measure")
            .with(play(100.0, Channel::Measure(0)))
            .with(BlockInstruction::Delay {
                duration: 300.0.into(),
                channel: Channel::Acquire(0),
                label: None,
            })
            .with(BlockInstruction::Acquire {
                duration: 200.0.into(),
                channel: Channel::Acquire(0),
                slot: MemorySlot(0),
                label: None,
            });

        let schedule = block.bind(&Bindings::default()).unwrap();
        let t0s: Vec<u64> = schedule.instructions().iter().map(|t| t.t0).collect();
        assert_eq!(t0s, vec![0, 0, 300]);
        assert_eq!(schedule.duration(), 500);
        assert_eq!(schedule.max_memory_slot(), Some(0));
    }

    #[test]
    fn test_zero_duration_instructions() {
        let block = ScheduleBlock::new("rz").with(BlockInstruction::ShiftPhase {
            phase: ParameterExpr::param("lambda_param"),
            channel: Channel::Drive(0),
        });
        assert_eq!(
            block.parameters().into_iter().collect::<Vec<_>>(),
            vec!["lambda_param"]
        );
        let mut b = Bindings::default();
        b.insert("lambda_param".into(), 1.0);
        let schedule = block.bind(&b).unwrap();
        assert_eq!(schedule.duration(), 0);
    }

    #[test]
    fn test_append_waits_for_shared_channels() {
        let first = ScheduleBlock::new("a")
            .with(play(40.0, Channel::Drive(0)))
            .bind(&Bindings::default())
            .unwrap();
        let second = ScheduleBlock::new("b")
            .with(play(10.0, Channel::Drive(0)))
            .with(play(10.0, Channel::Drive(1)))
            .bind(&Bindings::default())
            .unwrap();
        let independent = ScheduleBlock::new("c")
            .with(play(5.0, Channel::Drive(2)))
            .bind(&Bindings::default())
            .unwrap();

        let mut experiment = Schedule::new("exp");
        experiment.append(&first);
        experiment.append(&second);
        experiment.append(&independent);

        let t0s: Vec<u64> = experiment.instructions().iter().map(|t| t.t0).collect();
        assert_eq!(t0s, vec![0, 40, 40, 0]);
        assert_eq!(experiment.channel_end(Channel::Drive(1)), 50);
    }

    #[test]
    fn test_align_channels() {
        let mut s = Schedule::new("exp");
        s.push_asap(Instruction::Delay {
            duration: 30,
            channel: Channel::Drive(0),
            label: None,
        });
        s.align(&[Channel::Drive(0), Channel::Drive(1)]);
        assert_eq!(s.channel_end(Channel::Drive(1)), 30);
    }

    #[test]
    fn test_unbound_delay_fails() {
        let block = ScheduleBlock::new("delay").with(BlockInstruction::Delay {
            duration: ParameterExpr::param("tau"),
            channel: Channel::Drive(0),
            label: Some("Delay q0".into()),
        });
        assert!(block.bind(&Bindings::default()).is_err());
    }
}
