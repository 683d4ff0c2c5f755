// Copyright 2025 Accenture.
//
// SPDX-License-Identifier: Apache-2.0

use crate::fmt;
use crate::record::Record;
use std::io::{self, Write};

/// Stream the logger writes to
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Output {
    Stdout,
    #[default]
    Stderr,
}

#[derive(Debug)]
pub struct Console {
    output: Output,
}

impl Console {
    pub fn new(output: Output) -> Self {
        Self { output }
    }

    pub fn write(&self, record: &Record) -> io::Result<()> {
        match self.output {
            Output::Stdout => fmt::format(record, io::stdout().lock()),
            Output::Stderr => fmt::format(record, io::stderr().lock()),
        }
    }

    pub fn flush(&self) -> io::Result<()> {
        match self.output {
            Output::Stdout => io::stdout().flush(),
            Output::Stderr => io::stderr().flush(),
        }
    }
}
