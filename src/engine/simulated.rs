// Copyright (c) 2025 - Cowboy AI, Inc.
//! In-memory cloud provider
//!
//! Validates references the way the real API does, allocates AWS-shaped
//! ids and addresses, and records every call so callers can inspect the
//! order in which resources were requested and completed.

use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::debug;

use super::resource::{CreateRequest, Input, ProviderRecord, ResourceId, ResourceKind, ResourceSpec};
use super::{CloudProvider, ProviderError};
use crate::domain::Cidr;

/// First usable host offset in a subnet; the provider reserves the rest
const FIRST_PRIVATE_HOST: u64 = 4;

/// First public host handed out from 203.0.113.0/24 (TEST-NET-3)
const FIRST_PUBLIC_HOST: u8 = 10;

/// Upper bound on first-boot script size
const MAX_USER_DATA_BYTES: usize = 16 * 1024;

/// Phase of a provider call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CallPhase {
    Requested,
    Completed,
    Rejected,
}

/// One entry of the call log
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallRecord {
    pub sequence: usize,
    pub resource: String,
    pub kind: ResourceKind,
    pub phase: CallPhase,
}

/// A launched instance as the provider sees it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LaunchedInstance {
    pub id: ResourceId,
    pub private_ip: Ipv4Addr,
    pub public_ip: Option<Ipv4Addr>,
    pub user_data: String,
}

struct SubnetAllocation {
    cidr: Cidr,
    next_host: u64,
}

#[derive(Default)]
struct CloudState {
    next_serial: u64,
    vpcs: HashMap<ResourceId, Cidr>,
    subnets: HashMap<ResourceId, SubnetAllocation>,
    others: HashMap<ResourceId, ResourceKind>,
    next_public_host: u8,
    instances: HashMap<String, LaunchedInstance>,
    calls: Vec<CallRecord>,
}

impl CloudState {
    fn allocate_id(&mut self, kind: ResourceKind) -> ResourceId {
        self.next_serial += 1;
        ResourceId::new(format!("{}-{:017x}", kind.id_prefix(), self.next_serial))
    }

    fn exists(&self, id: &ResourceId, kind: ResourceKind) -> bool {
        match kind {
            ResourceKind::Vpc => self.vpcs.contains_key(id),
            ResourceKind::Subnet => self.subnets.contains_key(id),
            other => self.others.get(id) == Some(&other),
        }
    }

    fn require(&self, input: &Input<ResourceId>, field: &'static str, kind: ResourceKind) -> Result<ResourceId, ProviderError> {
        let id = input.value().ok_or(ProviderError::MissingInput(field))?;
        if self.exists(&id, kind) {
            Ok(id)
        } else {
            Err(ProviderError::NotFound(id))
        }
    }

    fn log(&mut self, resource: &str, kind: ResourceKind, phase: CallPhase) {
        let sequence = self.calls.len();
        self.calls.push(CallRecord {
            sequence,
            resource: resource.to_string(),
            kind,
            phase,
        });
    }
}

/// In-memory [`CloudProvider`]
pub struct SimulatedCloud {
    default_latency: Duration,
    latency: HashMap<String, Duration>,
    failures: HashMap<String, ProviderError>,
    pinned_private_ips: HashMap<String, Ipv4Addr>,
    state: Mutex<CloudState>,
}

impl Default for SimulatedCloud {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedCloud {
    pub fn new() -> Self {
        Self {
            default_latency: Duration::ZERO,
            latency: HashMap::new(),
            failures: HashMap::new(),
            pinned_private_ips: HashMap::new(),
            state: Mutex::new(CloudState {
                next_public_host: FIRST_PUBLIC_HOST,
                ..CloudState::default()
            }),
        }
    }

    /// Delay applied to every call without a specific latency
    pub fn with_default_latency(mut self, latency: Duration) -> Self {
        self.default_latency = latency;
        self
    }

    /// Delay before `resource` completes
    pub fn with_latency(mut self, resource: impl Into<String>, latency: Duration) -> Self {
        self.latency.insert(resource.into(), latency);
        self
    }

    /// Reject every creation of `resource` with `error`
    pub fn with_failure(mut self, resource: impl Into<String>, error: ProviderError) -> Self {
        self.failures.insert(resource.into(), error);
        self
    }

    /// Give instance `resource` this private address instead of the next free one
    pub fn with_private_ip(mut self, resource: impl Into<String>, ip: Ipv4Addr) -> Self {
        self.pinned_private_ips.insert(resource.into(), ip);
        self
    }

    fn lock(&self) -> MutexGuard<'_, CloudState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Every call so far, in the order it happened
    pub fn calls(&self) -> Vec<CallRecord> {
        self.lock().calls.clone()
    }

    /// Sequence number of the first `phase` call for `resource`
    pub fn position(&self, resource: &str, phase: CallPhase) -> Option<usize> {
        self.lock()
            .calls
            .iter()
            .find(|call| call.resource == resource && call.phase == phase)
            .map(|call| call.sequence)
    }

    /// Instance launched under `resource`, if any
    pub fn instance(&self, resource: &str) -> Option<LaunchedInstance> {
        self.lock().instances.get(resource).cloned()
    }

    /// Number of resources that exist
    pub fn resource_count(&self) -> usize {
        let state = self.lock();
        state.vpcs.len() + state.subnets.len() + state.others.len()
    }

    fn provision(&self, request: &CreateRequest) -> Result<ProviderRecord, ProviderError> {
        let mut state = self.lock();
        let kind = request.spec.kind();

        match &request.spec {
            ResourceSpec::Vpc { cidr_block, .. } => {
                let id = state.allocate_id(kind);
                state.vpcs.insert(id.clone(), *cidr_block);
                Ok(ProviderRecord::new(id))
            }
            ResourceSpec::Subnet {
                vpc_id, cidr_block, ..
            } => {
                let vpc = state.require(vpc_id, "vpc_id", ResourceKind::Vpc)?;
                let vpc_block = state.vpcs[&vpc];
                if !vpc_block.covers(cidr_block) {
                    return Err(ProviderError::rejected(
                        "InvalidSubnet.Range",
                        format!("{cidr_block} is not within {vpc_block}"),
                    ));
                }
                let id = state.allocate_id(kind);
                state.subnets.insert(
                    id.clone(),
                    SubnetAllocation {
                        cidr: *cidr_block,
                        next_host: FIRST_PRIVATE_HOST,
                    },
                );
                Ok(ProviderRecord::new(id))
            }
            ResourceSpec::InternetGateway { vpc_id, .. }
            | ResourceSpec::RouteTable { vpc_id, .. }
            | ResourceSpec::SecurityGroup { vpc_id, .. } => {
                state.require(vpc_id, "vpc_id", ResourceKind::Vpc)?;
                Ok(ProviderRecord::new(Self::insert_other(&mut state, kind)))
            }
            ResourceSpec::Route {
                route_table_id,
                gateway_id,
                ..
            } => {
                state.require(route_table_id, "route_table_id", ResourceKind::RouteTable)?;
                state.require(gateway_id, "gateway_id", ResourceKind::InternetGateway)?;
                Ok(ProviderRecord::new(Self::insert_other(&mut state, kind)))
            }
            ResourceSpec::RouteTableAssociation {
                subnet_id,
                route_table_id,
            } => {
                state.require(subnet_id, "subnet_id", ResourceKind::Subnet)?;
                state.require(route_table_id, "route_table_id", ResourceKind::RouteTable)?;
                Ok(ProviderRecord::new(Self::insert_other(&mut state, kind)))
            }
            ResourceSpec::Instance(spec) => {
                if !spec.ami.starts_with("ami-") {
                    return Err(ProviderError::rejected(
                        "InvalidAMIID.Malformed",
                        format!("invalid id: {}", spec.ami),
                    ));
                }
                let user_data = spec.user_data.value().ok_or(ProviderError::MissingInput("user_data"))?;
                if user_data.len() > MAX_USER_DATA_BYTES {
                    return Err(ProviderError::rejected(
                        "InvalidParameterValue",
                        format!("user data exceeds {MAX_USER_DATA_BYTES} bytes"),
                    ));
                }
                let subnet = state.require(&spec.subnet_id, "subnet_id", ResourceKind::Subnet)?;
                for group in &spec.security_group_ids {
                    state.require(group, "security_group_ids", ResourceKind::SecurityGroup)?;
                }

                let private_ip = self.allocate_private(&mut state, &request.name, &subnet)?;
                let public_ip = if spec.associate_public_ip_address {
                    let host = state.next_public_host;
                    if host == u8::MAX {
                        return Err(ProviderError::rejected(
                            "AddressLimitExceeded",
                            "public address pool exhausted",
                        ));
                    }
                    state.next_public_host += 1;
                    Some(Ipv4Addr::new(203, 0, 113, host))
                } else {
                    None
                };

                let id = Self::insert_other(&mut state, kind);
                state.instances.insert(
                    request.name.clone(),
                    LaunchedInstance {
                        id: id.clone(),
                        private_ip,
                        public_ip,
                        user_data,
                    },
                );
                Ok(ProviderRecord::new(id).with_addresses(private_ip, public_ip))
            }
        }
    }

    fn insert_other(state: &mut CloudState, kind: ResourceKind) -> ResourceId {
        let id = state.allocate_id(kind);
        state.others.insert(id.clone(), kind);
        id
    }

    fn allocate_private(
        &self,
        state: &mut CloudState,
        resource: &str,
        subnet: &ResourceId,
    ) -> Result<Ipv4Addr, ProviderError> {
        let allocation = state
            .subnets
            .get_mut(subnet)
            .ok_or_else(|| ProviderError::NotFound(subnet.clone()))?;

        if let Some(ip) = self.pinned_private_ips.get(resource) {
            if !allocation.cidr.contains(*ip) {
                return Err(ProviderError::rejected(
                    "InvalidParameterValue",
                    format!("address {ip} does not fall within {}", allocation.cidr),
                ));
            }
            return Ok(*ip);
        }

        // The last address of the block is reserved as well
        let ip = allocation
            .cidr
            .nth(allocation.next_host)
            .filter(|_| allocation.next_host + 1 < allocation.cidr.size())
            .ok_or_else(|| {
                ProviderError::rejected(
                    "InsufficientFreeAddressesInSubnet",
                    format!("no free addresses in {}", allocation.cidr),
                )
            })?;
        allocation.next_host += 1;
        Ok(ip)
    }
}

#[async_trait]
impl CloudProvider for SimulatedCloud {
    async fn create(&self, request: &CreateRequest) -> Result<ProviderRecord, ProviderError> {
        let kind = request.spec.kind();
        self.lock().log(&request.name, kind, CallPhase::Requested);

        let latency = self.latency.get(&request.name).copied().unwrap_or(self.default_latency);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let result = match self.failures.get(&request.name) {
            Some(error) => Err(error.clone()),
            None => self.provision(request),
        };

        let phase = if result.is_ok() {
            CallPhase::Completed
        } else {
            CallPhase::Rejected
        };
        self.lock().log(&request.name, kind, phase);
        debug!(resource = %request.name, %kind, ?phase, "simulated create");
        result
    }
}
