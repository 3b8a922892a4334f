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

use std::time::SystemTime;

/// Supplies the current time to the repository and the recovery driver.
pub trait TimeSource: Send + Sync {
    fn now(&self) -> SystemTime;
}

#[derive(Default, Clone)]
pub struct SystemTimeFactory {}

impl SystemTimeFactory {
    pub fn new() -> Self {
        SystemTimeFactory {}
    }
}

impl TimeSource for SystemTimeFactory {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// A time source which always reports the same instant.
#[derive(Clone)]
pub struct FixedTimeSource {
    now: SystemTime,
}

impl FixedTimeSource {
    pub fn new(now: SystemTime) -> Self {
        FixedTimeSource { now }
    }
}

impl TimeSource for FixedTimeSource {
    fn now(&self) -> SystemTime {
        self.now
    }
}
