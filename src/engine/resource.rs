// Copyright (c) 2025 - Cowboy AI, Inc.
//! Resource Declarations
//!
//! What a topology hands to the engine: the kind of resource, its inputs and
//! its explicit ordering constraints. Inputs are either known at declaration
//! time or deferred outputs of other resources.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::net::Ipv4Addr;

use crate::deferred::DeferredValue;
use crate::domain::{Cidr, TrafficRule};

/// Provider tag set
pub type Tags = BTreeMap<String, String>;

/// Tag set with a single `Name` tag
pub fn name_tag(name: impl Into<String>) -> Tags {
    Tags::from([("Name".to_string(), name.into())])
}

/// Provider-assigned resource identifier (`vpc-...`, `i-...`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(String);

impl ResourceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kind of cloud resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Vpc,
    Subnet,
    InternetGateway,
    RouteTable,
    Route,
    RouteTableAssociation,
    SecurityGroup,
    Instance,
}

impl ResourceKind {
    /// Prefix of provider ids for this kind
    pub fn id_prefix(&self) -> &'static str {
        match self {
            Self::Vpc => "vpc",
            Self::Subnet => "subnet",
            Self::InternetGateway => "igw",
            Self::RouteTable => "rtb",
            Self::Route => "r",
            Self::RouteTableAssociation => "rtbassoc",
            Self::SecurityGroup => "sg",
            Self::Instance => "i",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Vpc => "vpc",
            Self::Subnet => "subnet",
            Self::InternetGateway => "internet-gateway",
            Self::RouteTable => "route-table",
            Self::Route => "route",
            Self::RouteTableAssociation => "route-table-association",
            Self::SecurityGroup => "security-group",
            Self::Instance => "instance",
        };
        f.write_str(name)
    }
}

/// Resource input: known now, or produced by another resource later
#[derive(Debug, Clone)]
pub enum Input<T> {
    Known(T),
    Deferred(DeferredValue<T>),
}

impl<T: Clone + Send + Sync + 'static> Input<T> {
    /// Resources whose outputs this input is derived from
    pub fn sources(&self) -> BTreeSet<String> {
        match self {
            Input::Known(_) => BTreeSet::new(),
            Input::Deferred(value) => value.sources().clone(),
        }
    }

    /// The value, if available now
    pub fn value(&self) -> Option<T> {
        match self {
            Input::Known(value) => Some(value.clone()),
            Input::Deferred(value) => value.get(),
        }
    }

    /// Pin the current value, or `None` if still unresolved
    fn pinned(&self) -> Option<Input<T>> {
        self.value().map(Input::Known)
    }
}

impl<T> From<DeferredValue<T>> for Input<T> {
    fn from(value: DeferredValue<T>) -> Self {
        Input::Deferred(value)
    }
}

/// Compute instance declaration
#[derive(Debug, Clone)]
pub struct InstanceSpec {
    pub instance_type: String,
    pub ami: String,
    pub subnet_id: Input<ResourceId>,
    pub security_group_ids: Vec<Input<ResourceId>>,
    pub key_name: String,
    pub associate_public_ip_address: bool,
    /// First-boot script
    pub user_data: Input<String>,
    pub tags: Tags,
}

/// Resource declaration
#[derive(Debug, Clone)]
pub enum ResourceSpec {
    Vpc {
        cidr_block: Cidr,
        enable_dns_support: bool,
        enable_dns_hostnames: bool,
        tags: Tags,
    },
    Subnet {
        vpc_id: Input<ResourceId>,
        cidr_block: Cidr,
        availability_zone: String,
        map_public_ip_on_launch: bool,
        tags: Tags,
    },
    InternetGateway {
        vpc_id: Input<ResourceId>,
        tags: Tags,
    },
    RouteTable {
        vpc_id: Input<ResourceId>,
        tags: Tags,
    },
    Route {
        route_table_id: Input<ResourceId>,
        destination: Cidr,
        gateway_id: Input<ResourceId>,
    },
    RouteTableAssociation {
        subnet_id: Input<ResourceId>,
        route_table_id: Input<ResourceId>,
    },
    SecurityGroup {
        vpc_id: Input<ResourceId>,
        description: String,
        ingress: Vec<TrafficRule>,
        egress: Vec<TrafficRule>,
        tags: Tags,
    },
    Instance(InstanceSpec),
}

impl ResourceSpec {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Vpc { .. } => ResourceKind::Vpc,
            Self::Subnet { .. } => ResourceKind::Subnet,
            Self::InternetGateway { .. } => ResourceKind::InternetGateway,
            Self::RouteTable { .. } => ResourceKind::RouteTable,
            Self::Route { .. } => ResourceKind::Route,
            Self::RouteTableAssociation { .. } => ResourceKind::RouteTableAssociation,
            Self::SecurityGroup { .. } => ResourceKind::SecurityGroup,
            Self::Instance(_) => ResourceKind::Instance,
        }
    }

    /// Resources this declaration reads outputs from
    ///
    /// These are implicit dependencies: the engine never creates the
    /// resource before every one of them is up.
    pub fn data_sources(&self) -> BTreeSet<String> {
        let mut sources = BTreeSet::new();
        match self {
            Self::Vpc { .. } => {}
            Self::Subnet { vpc_id, .. }
            | Self::InternetGateway { vpc_id, .. }
            | Self::RouteTable { vpc_id, .. }
            | Self::SecurityGroup { vpc_id, .. } => sources.extend(vpc_id.sources()),
            Self::Route {
                route_table_id,
                gateway_id,
                ..
            } => {
                sources.extend(route_table_id.sources());
                sources.extend(gateway_id.sources());
            }
            Self::RouteTableAssociation {
                subnet_id,
                route_table_id,
            } => {
                sources.extend(subnet_id.sources());
                sources.extend(route_table_id.sources());
            }
            Self::Instance(spec) => {
                sources.extend(spec.subnet_id.sources());
                for group in &spec.security_group_ids {
                    sources.extend(group.sources());
                }
                sources.extend(spec.user_data.sources());
            }
        }
        sources
    }

    /// Copy of this declaration with every input pinned to its value
    ///
    /// # Errors
    ///
    /// Name of the first input that is still unresolved.
    pub fn pin(&self) -> Result<ResourceSpec, &'static str> {
        fn pin<T: Clone + Send + Sync + 'static>(
            input: &Input<T>,
            name: &'static str,
        ) -> Result<Input<T>, &'static str> {
            input.pinned().ok_or(name)
        }

        Ok(match self {
            Self::Vpc { .. } => self.clone(),
            Self::Subnet {
                vpc_id,
                cidr_block,
                availability_zone,
                map_public_ip_on_launch,
                tags,
            } => Self::Subnet {
                vpc_id: pin(vpc_id, "vpc_id")?,
                cidr_block: *cidr_block,
                availability_zone: availability_zone.clone(),
                map_public_ip_on_launch: *map_public_ip_on_launch,
                tags: tags.clone(),
            },
            Self::InternetGateway { vpc_id, tags } => Self::InternetGateway {
                vpc_id: pin(vpc_id, "vpc_id")?,
                tags: tags.clone(),
            },
            Self::RouteTable { vpc_id, tags } => Self::RouteTable {
                vpc_id: pin(vpc_id, "vpc_id")?,
                tags: tags.clone(),
            },
            Self::Route {
                route_table_id,
                destination,
                gateway_id,
            } => Self::Route {
                route_table_id: pin(route_table_id, "route_table_id")?,
                destination: *destination,
                gateway_id: pin(gateway_id, "gateway_id")?,
            },
            Self::RouteTableAssociation {
                subnet_id,
                route_table_id,
            } => Self::RouteTableAssociation {
                subnet_id: pin(subnet_id, "subnet_id")?,
                route_table_id: pin(route_table_id, "route_table_id")?,
            },
            Self::SecurityGroup {
                vpc_id,
                description,
                ingress,
                egress,
                tags,
            } => Self::SecurityGroup {
                vpc_id: pin(vpc_id, "vpc_id")?,
                description: description.clone(),
                ingress: ingress.clone(),
                egress: egress.clone(),
                tags: tags.clone(),
            },
            Self::Instance(spec) => Self::Instance(InstanceSpec {
                instance_type: spec.instance_type.clone(),
                ami: spec.ami.clone(),
                subnet_id: pin(&spec.subnet_id, "subnet_id")?,
                security_group_ids: spec
                    .security_group_ids
                    .iter()
                    .map(|group| pin(group, "security_group_ids"))
                    .collect::<Result<_, _>>()?,
                key_name: spec.key_name.clone(),
                associate_public_ip_address: spec.associate_public_ip_address,
                user_data: pin(&spec.user_data, "user_data")?,
                tags: spec.tags.clone(),
            }),
        })
    }
}

/// Explicit ordering constraints
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceOptions {
    /// Resources that must be created first, whether or not any of their
    /// outputs are read
    pub depends_on: Vec<String>,
}

impl ResourceOptions {
    /// Options with an explicit dependency list
    pub fn depends_on<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            depends_on: names.into_iter().map(Into::into).collect(),
        }
    }
}

/// Creation request handed to a provider, every input pinned
#[derive(Debug, Clone)]
pub struct CreateRequest {
    pub name: String,
    pub spec: ResourceSpec,
}

/// What a provider returns for a created resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderRecord {
    pub id: ResourceId,
    /// Set for instances only
    pub private_ip: Option<Ipv4Addr>,
    /// Set for instances launched with a public address
    pub public_ip: Option<Ipv4Addr>,
}

impl ProviderRecord {
    pub fn new(id: ResourceId) -> Self {
        Self {
            id,
            private_ip: None,
            public_ip: None,
        }
    }

    pub fn with_addresses(mut self, private_ip: Ipv4Addr, public_ip: Option<Ipv4Addr>) -> Self {
        self.private_ip = Some(private_ip);
        self.public_ip = public_ip;
        self
    }
}
