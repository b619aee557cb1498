use crate::item_set::SetRecord;
use crate::MaxsetError;
use clap::ValueEnum;
use std::io::Write;

/// What the engines write to stdout for each maximal set found.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputMode {
    /// Count maximal sets only, no per-set output.
    CountOnly,
    /// One set id per line.
    Id,
    /// Set id followed by the items, in input order.
    IdAndItems,
}

pub fn emit<W: Write>(
    out: &mut W,
    mode: OutputMode,
    maximal_set: &SetRecord,
) -> Result<(), MaxsetError> {
    match mode {
        OutputMode::CountOnly => Ok(()),
        OutputMode::Id => writeln!(out, "{}", maximal_set.id()).map_err(MaxsetError::Io),
        OutputMode::IdAndItems => writeln!(out, "{}", maximal_set).map_err(MaxsetError::Io),
    }
}
