// Copyright 2023 Bitwise IO, Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::error::TccError;

/// The result of a root's Try phase, as far as the coordinator is concerned.
#[derive(Debug)]
pub enum TryOutcome<R> {
    /// Every reservation was made; confirm.
    Success(R),
    /// The Try phase failed; cancel.
    Failure(TccError),
    /// It is unknown whether the Try phase took effect; keep trying and let recovery decide.
    Ambiguous(TccError),
}

impl<R> TryOutcome<R> {
    /// Classifies a Try result. An error is ambiguous if it was raised as such, or if its kind
    /// or the kind of its root cause satisfies `is_delay_cancel`.
    pub fn classify<P>(result: Result<R, TccError>, is_delay_cancel: P) -> Self
    where
        P: Fn(&str) -> bool,
    {
        match result {
            Ok(value) => TryOutcome::Success(value),
            Err(err) => {
                let ambiguous = matches!(&err, TccError::Try(e) if e.is_ambiguous())
                    || is_delay_cancel(err.kind())
                    || err.root_cause_kind().map_or(false, &is_delay_cancel);
                if ambiguous {
                    TryOutcome::Ambiguous(err)
                } else {
                    TryOutcome::Failure(err)
                }
            }
        }
    }
}
