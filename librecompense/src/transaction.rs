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

use std::collections::HashMap;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::context::TransactionContext;
use crate::error::{InvalidStateError, SystemError};
use crate::participant::Participant;
use crate::status::{TransactionStatus, TransactionType};
use crate::terminator::Terminator;
use crate::xid::Xid;

/// A compensable transaction, as persisted by a `TransactionRepository`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    xid: Xid,
    status: TransactionStatus,
    transaction_type: TransactionType,
    participants: Vec<Participant>,
    retried_count: u32,
    version: u64,
    create_time: SystemTime,
    last_update_time: SystemTime,
    attachments: HashMap<String, Value>,
}

impl Transaction {
    /// Creates a root transaction with a new global id.
    pub fn new_root() -> Self {
        Transaction::new(Xid::new(), TransactionType::Root)
    }

    /// Creates a branch transaction for a propagated context, keeping the context's xid.
    pub fn new_branch(context: &TransactionContext) -> Self {
        Transaction::new(context.xid().clone(), TransactionType::Branch)
    }

    fn new(xid: Xid, transaction_type: TransactionType) -> Self {
        let now = SystemTime::now();
        Transaction {
            xid,
            status: TransactionStatus::Trying,
            transaction_type,
            participants: Vec::new(),
            retried_count: 0,
            version: 1,
            create_time: now,
            last_update_time: now,
            attachments: HashMap::new(),
        }
    }

    pub fn xid(&self) -> &Xid {
        &self.xid
    }

    pub fn status(&self) -> TransactionStatus {
        self.status
    }

    pub(crate) fn change_status(&mut self, status: TransactionStatus) {
        self.status = status;
    }

    pub fn transaction_type(&self) -> TransactionType {
        self.transaction_type
    }

    /// The participants in enlistment order.
    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    /// Appends a participant.
    ///
    /// # Errors
    ///
    /// An [`InvalidStateError`] is returned if the transaction has left the Try phase.
    pub fn enlist_participant(
        &mut self,
        participant: Participant,
    ) -> Result<(), InvalidStateError> {
        if self.status != TransactionStatus::Trying {
            return Err(InvalidStateError::with_message(format!(
                "cannot enlist participant {} in transaction {} while {}",
                participant.xid(),
                self.xid,
                self.status
            )));
        }
        self.participants.push(participant);
        Ok(())
    }

    pub fn retried_count(&self) -> u32 {
        self.retried_count
    }

    pub fn add_retried_count(&mut self) {
        self.retried_count += 1;
    }

    pub fn reset_retried_count(&mut self, retried_count: u32) {
        self.retried_count = retried_count;
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Advances the version after a successful conditional write.
    pub fn update_version(&mut self) {
        self.version += 1;
    }

    pub fn create_time(&self) -> SystemTime {
        self.create_time
    }

    pub fn last_update_time(&self) -> SystemTime {
        self.last_update_time
    }

    pub fn set_last_update_time(&mut self, time: SystemTime) {
        self.last_update_time = time;
    }

    pub fn attachments(&self) -> &HashMap<String, Value> {
        &self.attachments
    }

    pub fn attachments_mut(&mut self) -> &mut HashMap<String, Value> {
        &mut self.attachments
    }

    /// Invokes every participant's confirm action in enlistment order, stopping at the first
    /// failure.
    pub fn commit(&self, terminator: &Terminator) -> Result<(), SystemError> {
        for participant in &self.participants {
            participant.commit(terminator)?;
        }
        Ok(())
    }

    /// Invokes every participant's cancel action in enlistment order, stopping at the first
    /// failure.
    pub fn rollback(&self, terminator: &Terminator) -> Result<(), SystemError> {
        for participant in &self.participants {
            participant.rollback(terminator)?;
        }
        Ok(())
    }
}
