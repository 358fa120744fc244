use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::decoder::{AccessKind, AddressDecoder};
use super::error::PimError;
use super::sram::Sram;

pub type ReqId = u64;

/// One asynchronous DRAM operation issued by a function FSM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DramRequest {
  pub id: ReqId,
  pub addr: u64,
  pub is_write: bool,
  pub num_bytes: usize,
  /// Payload for writes, empty for reads.
  pub data: Vec<u8>,
}

impl DramRequest {
  pub fn read(id: ReqId, addr: u64, num_bytes: usize) -> Self {
    Self {
      id,
      addr,
      is_write: false,
      num_bytes,
      data: Vec::new(),
    }
  }

  pub fn write(id: ReqId, addr: u64, data: Vec<u8>) -> Self {
    Self {
      id,
      addr,
      is_write: true,
      num_bytes: data.len(),
      data,
    }
  }
}

/// Completion of a `DramRequest`; `data` holds the bytes read, empty for writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DramResponse {
  pub id: ReqId,
  pub data: Vec<u8>,
}

/// Host memory subsystem that accepts requests and later answers them
/// through `PimUnit::complete`.
pub trait DramPort {
  fn issue(&mut self, req: DramRequest) -> Result<(), PimError>;
}

/// Assigns request ids, queues outgoing requests and remembers which
/// function slot owns each one until its completion arrives.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestIssuer {
  next_id: ReqId,
  outbox: Vec<DramRequest>,
  owners: BTreeMap<ReqId, usize>,
}

impl RequestIssuer {
  pub fn new() -> Self {
    Self::default()
  }

  fn alloc(&mut self, owner: usize) -> ReqId {
    let id = self.next_id;
    self.next_id += 1;
    self.owners.insert(id, owner);
    id
  }

  pub fn issue_read(&mut self, owner: usize, addr: u64, num_bytes: usize) -> ReqId {
    let id = self.alloc(owner);
    debug!("func[{}] dram read id={} addr={:#x} len={}", owner, id, addr, num_bytes);
    self.outbox.push(DramRequest::read(id, addr, num_bytes));
    id
  }

  pub fn issue_write(&mut self, owner: usize, addr: u64, data: Vec<u8>) -> ReqId {
    let id = self.alloc(owner);
    debug!("func[{}] dram write id={} addr={:#x} len={}", owner, id, addr, data.len());
    self.outbox.push(DramRequest::write(id, addr, data));
    id
  }

  /// Requests issued since the last call, in issue order.
  pub fn drain(&mut self) -> Vec<DramRequest> {
    std::mem::take(&mut self.outbox)
  }

  /// Slot that issued `id`, if it is still outstanding.
  pub fn owner(&self, id: ReqId) -> Result<usize, PimError> {
    self.owners.get(&id).copied().ok_or(PimError::UnknownRequest(id))
  }

  /// Forget `id` and return its owner.
  pub fn retire(&mut self, id: ReqId) -> Result<usize, PimError> {
    self.owners.remove(&id).ok_or(PimError::UnknownRequest(id))
  }

  pub fn in_flight(&self) -> usize {
    self.owners.len()
  }
}

/// What an FSM may touch while starting or stepping.
pub struct StepCtx<'a> {
  pub decoder: &'a AddressDecoder,
  pub sram: &'a mut Sram,
  issuer: &'a mut RequestIssuer,
  owner: usize,
}

impl<'a> StepCtx<'a> {
  pub fn new(decoder: &'a AddressDecoder, sram: &'a mut Sram, issuer: &'a mut RequestIssuer, owner: usize) -> Self {
    Self {
      decoder,
      sram,
      issuer,
      owner,
    }
  }

  pub fn kind_of(&self, addr: u64) -> AccessKind {
    self.decoder.decode(addr).kind
  }

  pub fn issue_read(&mut self, addr: u64, num_bytes: usize) -> ReqId {
    self.issuer.issue_read(self.owner, addr, num_bytes)
  }

  pub fn issue_write(&mut self, addr: u64, data: Vec<u8>) -> ReqId {
    self.issuer.issue_write(self.owner, addr, data)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_issue_and_retire() {
    let mut issuer = RequestIssuer::new();
    let a = issuer.issue_read(2, 0x100, 64);
    let b = issuer.issue_write(3, 0x200, vec![1; 8]);
    assert_ne!(a, b);
    assert_eq!(issuer.in_flight(), 2);

    let reqs = issuer.drain();
    assert_eq!(reqs.len(), 2);
    assert!(!reqs[0].is_write && reqs[0].num_bytes == 64);
    assert!(reqs[1].is_write && reqs[1].data == vec![1; 8]);
    assert!(issuer.drain().is_empty());

    assert_eq!(issuer.owner(b), Ok(3));
    assert_eq!(issuer.in_flight(), 2);
    assert_eq!(issuer.retire(b), Ok(3));
    assert_eq!(issuer.owner(b), Err(PimError::UnknownRequest(b)));
    assert_eq!(issuer.retire(a), Ok(2));
    assert_eq!(issuer.retire(a), Err(PimError::UnknownRequest(a)));
    assert_eq!(issuer.in_flight(), 0);
  }
}
