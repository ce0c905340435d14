// ── CIDR address blocks ──
//
// `AddressBlock` is the leaf value type of the whole planner: pool
// ranges, instance sub-ranges and pushed routes are all blocks. Both
// families are handled as a `u128` bit pattern internally, with the
// family deciding the width (32 or 128 bits).

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::CoreError;

/// Smallest IPv4 sub-block `split` will produce (/30: two usable hosts).
const MAX_V4_SPLIT_PREFIX: u8 = 30;
/// Largest IPv6 prefix `split` accepts; leaves room for one nibble of subnets.
const MAX_V6_SPLIT_PREFIX: u8 = 60;
/// Every IPv6 sub-block is a /64.
const V6_SPLIT_PREFIX: u8 = 64;

// ── AddressFamily ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
pub enum AddressFamily {
    #[strum(serialize = "IPv4")]
    V4,
    #[strum(serialize = "IPv6")]
    V6,
}

impl AddressFamily {
    pub fn of(addr: &IpAddr) -> Self {
        match addr {
            IpAddr::V4(_) => Self::V4,
            IpAddr::V6(_) => Self::V6,
        }
    }

    /// Address width in bits.
    pub fn bits(self) -> u8 {
        match self {
            Self::V4 => 32,
            Self::V6 => 128,
        }
    }
}

// ── AddressBlock ────────────────────────────────────────────────────

/// One IPv4 or IPv6 CIDR block, e.g. `10.42.42.0/24`.
///
/// The address is kept as written (only its textual form is normalised),
/// so `10.42.42.1/24` stays distinguishable from its network
/// `10.42.42.0/24`; use [`AddressBlock::truncated`] to drop host bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AddressBlock {
    address: IpAddr,
    prefix: u8,
}

impl AddressBlock {
    /// Build a block from parts, validating the prefix length.
    pub fn new(address: IpAddr, prefix: u8) -> Result<Self, CoreError> {
        let bits = AddressFamily::of(&address).bits();
        if prefix > bits {
            return Err(CoreError::InvalidAddress {
                input: format!("{address}/{prefix}"),
                reason: format!("prefix length must be between 0 and {bits}"),
            });
        }
        Ok(Self { address, prefix })
    }

    /// Parse `address` or `address/prefix`. A bare address is a host
    /// block (/32 or /128).
    pub fn parse(text: &str) -> Result<Self, CoreError> {
        let invalid = |reason: &str| CoreError::InvalidAddress {
            input: text.to_owned(),
            reason: reason.to_owned(),
        };

        let (addr_part, prefix_part) = match text.trim().split_once('/') {
            Some((addr, prefix)) => (addr, Some(prefix)),
            None => (text.trim(), None),
        };
        let address: IpAddr = addr_part
            .parse()
            .map_err(|_| invalid("not an IPv4 or IPv6 address"))?;
        let prefix = match prefix_part {
            Some(p) => p
                .parse::<u8>()
                .map_err(|_| invalid("prefix length is not a number"))?,
            None => AddressFamily::of(&address).bits(),
        };
        Self::new(address, prefix)
    }

    // ── Accessors ───────────────────────────────────────────────────

    pub fn address(&self) -> IpAddr {
        self.address
    }

    pub fn prefix(&self) -> u8 {
        self.prefix
    }

    pub fn family(&self) -> AddressFamily {
        AddressFamily::of(&self.address)
    }

    pub fn is_ipv4(&self) -> bool {
        self.family() == AddressFamily::V4
    }

    pub fn is_ipv6(&self) -> bool {
        self.family() == AddressFamily::V6
    }

    // ── IPv4-only views ─────────────────────────────────────────────

    pub fn netmask(&self) -> Result<Ipv4Addr, CoreError> {
        self.require_v4("netmask")?;
        Ok(v4_from_bits(self.mask()))
    }

    pub fn network(&self) -> Result<Ipv4Addr, CoreError> {
        self.require_v4("network")?;
        Ok(v4_from_bits(self.network_bits()))
    }

    pub fn broadcast(&self) -> Result<Ipv4Addr, CoreError> {
        self.require_v4("broadcast")?;
        Ok(v4_from_bits(self.last_bits()))
    }

    // ── Counting ────────────────────────────────────────────────────

    /// Number of addresses in the block, saturating at `u128::MAX` for ::/0.
    pub fn address_count(&self) -> u128 {
        let host_bits = u32::from(self.family().bits() - self.prefix);
        1u128.checked_shl(host_bits).unwrap_or(u128::MAX)
    }

    /// Usable host addresses: the block minus its network and broadcast
    /// addresses. Zero for /31 and /32.
    pub fn host_count(&self) -> u128 {
        self.address_count().saturating_sub(2)
    }

    // ── Membership ──────────────────────────────────────────────────

    /// Returns `true` if `addr` lies inside this block.
    ///
    /// Unless `include_network_and_broadcast` is set, the network address
    /// (and for IPv4 the broadcast address) are treated as outside.
    pub fn in_range(&self, addr: IpAddr, include_network_and_broadcast: bool) -> bool {
        if AddressFamily::of(&addr) != self.family() {
            return false;
        }
        let value = ip_bits(addr);
        if value & self.mask() != self.network_bits() {
            return false;
        }
        if include_network_and_broadcast {
            return true;
        }
        let is_broadcast = self.is_ipv4() && value == self.last_bits();
        value != self.network_bits() && !is_broadcast
    }

    /// Returns `true` if `other` is entirely inside this block.
    pub fn contains(&self, other: &AddressBlock) -> bool {
        other.family() == self.family()
            && other.prefix >= self.prefix
            && other.network_bits() & self.mask() == self.network_bits()
    }

    /// Same block with host bits cleared.
    pub fn truncated(&self) -> AddressBlock {
        AddressBlock {
            address: self.addr_from_bits(self.network_bits()),
            prefix: self.prefix,
        }
    }

    // ── Splitting ───────────────────────────────────────────────────

    /// Split into `n` equally sized, contiguous sub-blocks.
    ///
    /// IPv4 blocks are divided in place (`prefix + log2(n)`, at most /30).
    /// IPv6 blocks are carved into `/64` networks numbered `0..n` in the
    /// lowest bits of the 64-bit network part, which requires the
    /// prefix to sit on a nibble boundary at or below /60.
    pub fn split(&self, n: u32) -> Result<Vec<AddressBlock>, CoreError> {
        if n == 0 || !n.is_power_of_two() {
            return Err(CoreError::InvalidSplitCount { count: n });
        }
        match self.family() {
            AddressFamily::V4 => self.split_v4(n),
            AddressFamily::V6 => self.split_v6(n),
        }
    }

    fn split_v4(&self, n: u32) -> Result<Vec<AddressBlock>, CoreError> {
        let extra = u8::try_from(n.trailing_zeros()).unwrap_or(u8::MAX);
        let new_prefix = self.prefix.saturating_add(extra);
        if new_prefix > MAX_V4_SPLIT_PREFIX {
            return Err(self.too_small(format!(
                "{n} sub-blocks would need a /{new_prefix}, smallest allowed is /{MAX_V4_SPLIT_PREFIX}"
            )));
        }

        let size = 1u128 << (32 - new_prefix);
        let base = self.network_bits();
        Ok((0..u128::from(n))
            .map(|i| AddressBlock {
                address: IpAddr::V4(v4_from_bits(base + i * size)),
                prefix: new_prefix,
            })
            .collect())
    }

    fn split_v6(&self, n: u32) -> Result<Vec<AddressBlock>, CoreError> {
        if self.prefix % 4 != 0 {
            return Err(self.too_small(format!(
                "IPv6 prefix /{} is not a multiple of 4",
                self.prefix
            )));
        }
        if self.prefix > MAX_V6_SPLIT_PREFIX {
            return Err(self.too_small(format!(
                "IPv6 prefix must be /{MAX_V6_SPLIT_PREFIX} or shorter"
            )));
        }
        let available = 1u128 << (V6_SPLIT_PREFIX - self.prefix);
        if u128::from(n) > available {
            return Err(self.too_small(format!("only {available} /64 networks available")));
        }

        let base = self.network_bits();
        Ok((0..u128::from(n))
            .map(|i| AddressBlock {
                address: IpAddr::V6(Ipv6Addr::from(base | (i << 64))),
                prefix: V6_SPLIT_PREFIX,
            })
            .collect())
    }

    // ── Bit helpers ─────────────────────────────────────────────────

    fn mask(&self) -> u128 {
        let bits = self.family().bits();
        if self.prefix == 0 {
            return 0;
        }
        (u128::MAX << (128 - u32::from(self.prefix))) >> (128 - u32::from(bits))
    }

    fn network_bits(&self) -> u128 {
        ip_bits(self.address) & self.mask()
    }

    fn last_bits(&self) -> u128 {
        let width = u128::MAX >> (128 - u32::from(self.family().bits()));
        self.network_bits() | (!self.mask() & width)
    }

    fn addr_from_bits(&self, value: u128) -> IpAddr {
        match self.family() {
            AddressFamily::V4 => IpAddr::V4(v4_from_bits(value)),
            AddressFamily::V6 => IpAddr::V6(Ipv6Addr::from(value)),
        }
    }

    fn require_v4(&self, operation: &str) -> Result<(), CoreError> {
        if self.is_ipv4() {
            Ok(())
        } else {
            Err(CoreError::FamilyMismatch {
                operation: operation.to_owned(),
                expected: AddressFamily::V4,
                block: self.to_string(),
            })
        }
    }

    fn too_small(&self, reason: String) -> CoreError {
        CoreError::RangeTooSmall {
            block: self.to_string(),
            reason,
        }
    }
}

fn ip_bits(addr: IpAddr) -> u128 {
    match addr {
        IpAddr::V4(v4) => u128::from(u32::from(v4)),
        IpAddr::V6(v6) => u128::from(v6),
    }
}

fn v4_from_bits(value: u128) -> Ipv4Addr {
    Ipv4Addr::from(u32::try_from(value & u128::from(u32::MAX)).unwrap_or(u32::MAX))
}

// ── Conversions ─────────────────────────────────────────────────────

impl fmt::Display for AddressBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.address, self.prefix)
    }
}

impl FromStr for AddressBlock {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for AddressBlock {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<AddressBlock> for String {
    fn from(block: AddressBlock) -> Self {
        block.to_string()
    }
}

impl From<IpAddr> for AddressBlock {
    /// Host block for a single address.
    fn from(address: IpAddr) -> Self {
        let prefix = AddressFamily::of(&address).bits();
        Self { address, prefix }
    }
}
