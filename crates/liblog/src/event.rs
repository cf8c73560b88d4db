// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Typed payload encoding for the binary buffers (events, stats, security).
//!
//! A payload starts with a little-endian `i32` tag followed by one typed value. Values are
//! a type byte and a little-endian body: `i32`, `i64`, `f32`, a `u32`-length-prefixed
//! string, or a list (`u8` element count, then the elements).

use crate::constants::MAX_PAYLOAD;
use crate::errors::WriteError;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    Int = 0,
    Long = 1,
    String = 2,
    List = 3,
    Float = 4,
}

/// Size of a tag plus a single `Int` value.
pub const INT_EVENT_SIZE: usize = 9;

/// Size of a tag, the `String` type byte and the length, before the string bytes.
pub const STRING_EVENT_HEADER_SIZE: usize = 9;

const MAX_LIST_ELEMENTS: u8 = u8::MAX;

#[must_use]
pub fn int_event(tag: i32, value: i32) -> [u8; INT_EVENT_SIZE] {
    let mut out = [0u8; INT_EVENT_SIZE];
    out[0..4].copy_from_slice(&tag.to_le_bytes());
    out[4] = EventType::Int as u8;
    out[5..9].copy_from_slice(&value.to_le_bytes());
    out
}

/// Encodes a tag and a single string value, clipping the string so the whole payload
/// fits in `budget` bytes.
#[must_use]
pub fn string_event(tag: i32, value: &[u8], budget: usize) -> Vec<u8> {
    let len = value
        .len()
        .min(budget.saturating_sub(STRING_EVENT_HEADER_SIZE));
    let mut out = Vec::with_capacity(STRING_EVENT_HEADER_SIZE + len);
    out.extend_from_slice(&tag.to_le_bytes());
    out.push(EventType::String as u8);
    out.extend_from_slice(&(len as u32).to_le_bytes());
    out.extend_from_slice(&value[..len]);
    out
}

/// Builds an event payload value by value.
///
/// Values that do not fit in [`MAX_PAYLOAD`] are dropped and the builder remembers the
/// overflow; strings are clipped to whatever room is left.
#[derive(Debug)]
pub struct EventBuilder {
    buf: Vec<u8>,
    // (offset of the count byte, elements so far) for every open list
    lists: Vec<(usize, u8)>,
    values: usize,
    overflowed: bool,
}

impl EventBuilder {
    #[must_use]
    pub fn new(tag: i32) -> Self {
        let mut buf = Vec::with_capacity(64);
        buf.extend_from_slice(&tag.to_le_bytes());
        EventBuilder {
            buf,
            lists: Vec::new(),
            values: 0,
            overflowed: false,
        }
    }

    #[must_use]
    pub fn overflowed(&self) -> bool {
        self.overflowed
    }

    fn remaining(&self) -> usize {
        MAX_PAYLOAD.saturating_sub(self.buf.len())
    }

    // Accounts one element in the innermost open list; false when it cannot take more.
    fn claim_slot(&mut self) -> bool {
        match self.lists.last_mut() {
            Some((_, count)) if *count == MAX_LIST_ELEMENTS => false,
            Some((_, count)) => {
                *count += 1;
                true
            }
            None if self.values > 0 => false,
            None => {
                self.values += 1;
                true
            }
        }
    }

    fn push_value(&mut self, kind: EventType, body: &[u8]) -> &mut Self {
        if self.overflowed || 1 + body.len() > self.remaining() || !self.claim_slot() {
            self.overflowed = true;
            return self;
        }
        self.buf.push(kind as u8);
        self.buf.extend_from_slice(body);
        self
    }

    pub fn int(&mut self, value: i32) -> &mut Self {
        self.push_value(EventType::Int, &value.to_le_bytes())
    }

    pub fn long(&mut self, value: i64) -> &mut Self {
        self.push_value(EventType::Long, &value.to_le_bytes())
    }

    pub fn float(&mut self, value: f32) -> &mut Self {
        self.push_value(EventType::Float, &value.to_le_bytes())
    }

    pub fn string(&mut self, value: &str) -> &mut Self {
        if self.overflowed || self.remaining() < 5 || !self.claim_slot() {
            self.overflowed = true;
            return self;
        }
        let len = value.len().min(self.remaining() - 5);
        self.buf.push(EventType::String as u8);
        self.buf.extend_from_slice(&(len as u32).to_le_bytes());
        self.buf.extend_from_slice(&value.as_bytes()[..len]);
        if len < value.len() {
            self.overflowed = true;
        }
        self
    }

    pub fn begin_list(&mut self) -> &mut Self {
        if self.overflowed || self.remaining() < 2 || !self.claim_slot() {
            self.overflowed = true;
            return self;
        }
        self.buf.push(EventType::List as u8);
        self.lists.push((self.buf.len(), 0));
        self.buf.push(0);
        self
    }

    pub fn end_list(&mut self) -> &mut Self {
        if let Some((offset, count)) = self.lists.pop() {
            self.buf[offset] = count;
        } else {
            self.overflowed = true;
        }
        self
    }

    /// Finishes the payload. Lists still open at this point are a caller bug.
    pub fn build(&mut self) -> Result<Vec<u8>, WriteError> {
        if !self.lists.is_empty() {
            return Err(WriteError::InvalidArgument);
        }
        Ok(std::mem::take(&mut self.buf))
    }
}
