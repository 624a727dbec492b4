//! Audit rule records (`struct audit_rule_data`).
//!
//! A rule is a syscall bitmask plus an ordered list of field/operator/value
//! triples. The kernel evaluates the triples as a conjunction in insertion
//! order.
//!
//! # Example
//!
//! ```ignore
//! use nlaudit::netlink::audit_rule::{AuditAction, AuditField, AuditFilter, AuditOperator, AuditRule};
//!
//! let mut rule = AuditRule::new();
//! rule.set_syscall(84)?; // rmdir on x86_64
//! rule.add_field(AuditField::Arch, AuditOperator::Equal, 0xc000_003e)?;
//! conn.add_rule(&mut rule, AuditFilter::Exit, AuditAction::Always).await?;
//! ```

use super::codec::{ByteOrder, Codec, PResult, parse_error, parse_u32, parse_u32_array};
use super::error::{Error, Result};

/// Maximum number of field triples in one rule.
pub const AUDIT_MAX_FIELDS: usize = 64;

/// Number of 32-bit words in the syscall bitmask.
pub const AUDIT_BITMASK_SIZE: usize = 64;

/// Filter list a rule is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AuditFilter {
    /// User-generated messages.
    User,
    /// Task creation.
    Task,
    /// Syscall entry. Deprecated by the kernel.
    Entry,
    /// File system watches.
    Watch,
    /// Syscall exit.
    Exit,
    /// Record type exclusion at `audit_log_start`.
    Type,
    /// File system events.
    Fs,
}

impl AuditFilter {
    /// Get the kernel value.
    pub fn as_u32(self) -> u32 {
        match self {
            Self::User => 0x00,
            Self::Task => 0x01,
            Self::Entry => 0x02,
            Self::Watch => 0x03,
            Self::Exit => 0x04,
            Self::Type => 0x05,
            Self::Fs => 0x06,
        }
    }

    /// Convert from the kernel value.
    pub fn from_u32(val: u32) -> Option<Self> {
        Some(match val {
            0x00 => Self::User,
            0x01 => Self::Task,
            0x02 => Self::Entry,
            0x03 => Self::Watch,
            0x04 => Self::Exit,
            0x05 => Self::Type,
            0x06 => Self::Fs,
            _ => return None,
        })
    }

    /// Parse an auditctl list name (`exit`, `task`, ...).
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "user" => Self::User,
            "task" => Self::Task,
            "entry" => Self::Entry,
            "watch" => Self::Watch,
            "exit" => Self::Exit,
            "exclude" | "type" => Self::Type,
            "filesystem" | "fs" => Self::Fs,
            _ => return None,
        })
    }
}

/// What to do when a rule matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AuditAction {
    /// Do not build context or log.
    Never,
    /// Build context, log only if another rule asks.
    Possible,
    /// Always log.
    Always,
}

impl AuditAction {
    /// Get the kernel value.
    pub fn as_u32(self) -> u32 {
        match self {
            Self::Never => 0,
            Self::Possible => 1,
            Self::Always => 2,
        }
    }

    /// Convert from the kernel value.
    pub fn from_u32(val: u32) -> Option<Self> {
        Some(match val {
            0 => Self::Never,
            1 => Self::Possible,
            2 => Self::Always,
            _ => return None,
        })
    }

    /// Parse an auditctl action name.
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "never" => Self::Never,
            "possible" => Self::Possible,
            "always" => Self::Always,
            _ => return None,
        })
    }
}

// Operator bits (from linux/audit.h)
const AUDIT_BIT_MASK: u32 = 0x0800_0000;
const AUDIT_LESS_THAN: u32 = 0x1000_0000;
const AUDIT_GREATER_THAN: u32 = 0x2000_0000;
const AUDIT_NOT_EQUAL: u32 = 0x3000_0000;
const AUDIT_EQUAL: u32 = 0x4000_0000;
const AUDIT_BIT_TEST: u32 = AUDIT_BIT_MASK | AUDIT_EQUAL;
const AUDIT_LESS_THAN_OR_EQUAL: u32 = AUDIT_LESS_THAN | AUDIT_EQUAL;
const AUDIT_GREATER_THAN_OR_EQUAL: u32 = AUDIT_GREATER_THAN | AUDIT_EQUAL;

/// Comparison applied by a field triple. Stored in `fieldflags`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AuditOperator {
    /// `==`
    Equal,
    /// `!=`
    NotEqual,
    /// `<`
    LessThan,
    /// `>`
    GreaterThan,
    /// `<=`
    LessThanOrEqual,
    /// `>=`
    GreaterThanOrEqual,
    /// Any of the bits are set.
    BitMask,
    /// All of the bits are set.
    BitTest,
}

impl AuditOperator {
    /// Get the kernel value.
    pub fn as_u32(self) -> u32 {
        match self {
            Self::Equal => AUDIT_EQUAL,
            Self::NotEqual => AUDIT_NOT_EQUAL,
            Self::LessThan => AUDIT_LESS_THAN,
            Self::GreaterThan => AUDIT_GREATER_THAN,
            Self::LessThanOrEqual => AUDIT_LESS_THAN_OR_EQUAL,
            Self::GreaterThanOrEqual => AUDIT_GREATER_THAN_OR_EQUAL,
            Self::BitMask => AUDIT_BIT_MASK,
            Self::BitTest => AUDIT_BIT_TEST,
        }
    }

    /// Convert from the kernel value.
    pub fn from_u32(val: u32) -> Option<Self> {
        Some(match val {
            AUDIT_EQUAL => Self::Equal,
            AUDIT_NOT_EQUAL => Self::NotEqual,
            AUDIT_LESS_THAN => Self::LessThan,
            AUDIT_GREATER_THAN => Self::GreaterThan,
            AUDIT_LESS_THAN_OR_EQUAL => Self::LessThanOrEqual,
            AUDIT_GREATER_THAN_OR_EQUAL => Self::GreaterThanOrEqual,
            AUDIT_BIT_MASK => Self::BitMask,
            AUDIT_BIT_TEST => Self::BitTest,
            _ => return None,
        })
    }

    /// Parse the auditctl operator syntax.
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        Some(match symbol {
            "=" => Self::Equal,
            "!=" => Self::NotEqual,
            "<" => Self::LessThan,
            ">" => Self::GreaterThan,
            "<=" => Self::LessThanOrEqual,
            ">=" => Self::GreaterThanOrEqual,
            "&" => Self::BitMask,
            "&=" => Self::BitTest,
            _ => return None,
        })
    }

    /// Get the auditctl operator syntax.
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Equal => "=",
            Self::NotEqual => "!=",
            Self::LessThan => "<",
            Self::GreaterThan => ">",
            Self::LessThanOrEqual => "<=",
            Self::GreaterThanOrEqual => ">=",
            Self::BitMask => "&",
            Self::BitTest => "&=",
        }
    }
}

macro_rules! audit_fields {
    ($($variant:ident = $value:literal, $name:literal;)*) => {
        /// Rule field selector.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        pub enum AuditField {
            $($variant,)*
            /// Field id without a named variant.
            Other(u32),
        }

        impl AuditField {
            /// Get the kernel value.
            pub fn as_u32(self) -> u32 {
                match self {
                    $(Self::$variant => $value,)*
                    Self::Other(v) => v,
                }
            }

            /// Convert from the kernel value.
            pub fn from_u32(val: u32) -> Self {
                match val {
                    $($value => Self::$variant,)*
                    v => Self::Other(v),
                }
            }

            /// Parse an auditctl field name.
            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $($name => Some(Self::$variant),)*
                    _ => None,
                }
            }

            /// Get the auditctl field name.
            pub fn name(self) -> Option<&'static str> {
                match self {
                    $(Self::$variant => Some($name),)*
                    Self::Other(_) => None,
                }
            }
        }
    };
}

audit_fields! {
    Pid = 0, "pid";
    Uid = 1, "uid";
    Euid = 2, "euid";
    Suid = 3, "suid";
    Fsuid = 4, "fsuid";
    Gid = 5, "gid";
    Egid = 6, "egid";
    Sgid = 7, "sgid";
    Fsgid = 8, "fsgid";
    LoginUid = 9, "auid";
    Personality = 10, "personality";
    Arch = 11, "arch";
    MsgType = 12, "msgtype";
    SubjUser = 13, "subj_user";
    SubjRole = 14, "subj_role";
    SubjType = 15, "subj_type";
    SubjSen = 16, "subj_sen";
    SubjClr = 17, "subj_clr";
    Ppid = 18, "ppid";
    ObjUser = 19, "obj_user";
    ObjRole = 20, "obj_role";
    ObjType = 21, "obj_type";
    ObjLevLow = 22, "obj_lev_low";
    ObjLevHigh = 23, "obj_lev_high";
    LoginUidSet = 24, "loginuid_set";
    SessionId = 25, "sessionid";
    FsType = 26, "fstype";
    DevMajor = 100, "devmajor";
    DevMinor = 101, "devminor";
    Inode = 102, "inode";
    Exit = 103, "exit";
    Success = 104, "success";
    Watch = 105, "path";
    Perm = 106, "perm";
    Dir = 107, "dir";
    FileType = 108, "filetype";
    ObjUid = 109, "obj_uid";
    ObjGid = 110, "obj_gid";
    FieldCompare = 111, "field_compare";
    Exe = 112, "exe";
    Arg0 = 200, "a0";
    Arg1 = 201, "a1";
    Arg2 = 202, "a2";
    Arg3 = 203, "a3";
    FilterKey = 210, "key";
}

/// An audit rule (mirrors `struct audit_rule_data`).
///
/// The fixed part is [`AuditRule::FIXED_SIZE`] bytes; `buflen` is not stored
/// but always derived from the string buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditRule {
    /// Filter list (`AUDIT_FILTER_*`), set by `add_rule`.
    pub flags: u32,
    /// Action (`AUDIT_NEVER` etc.), set by `add_rule`.
    pub action: u32,
    field_count: u32,
    mask: [u32; AUDIT_BITMASK_SIZE],
    fields: [u32; AUDIT_MAX_FIELDS],
    values: [u32; AUDIT_MAX_FIELDS],
    fieldflags: [u32; AUDIT_MAX_FIELDS],
    buf: Vec<u8>,
}

impl Default for AuditRule {
    fn default() -> Self {
        Self {
            flags: 0,
            action: 0,
            field_count: 0,
            mask: [0; AUDIT_BITMASK_SIZE],
            fields: [0; AUDIT_MAX_FIELDS],
            values: [0; AUDIT_MAX_FIELDS],
            fieldflags: [0; AUDIT_MAX_FIELDS],
            buf: Vec::new(),
        }
    }
}

impl AuditRule {
    /// Size of everything before the string buffer.
    pub const FIXED_SIZE: usize = 4 * (3 + AUDIT_BITMASK_SIZE + 3 * AUDIT_MAX_FIELDS + 1);

    /// Create an empty rule.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a syscall to the rule's bitmask.
    ///
    /// The last bitmask word is reserved; numbers that fall in it are
    /// rejected and the rule is left unchanged.
    pub fn set_syscall(&mut self, nr: u32) -> Result<()> {
        let word = (nr / 32) as usize;
        if word >= AUDIT_BITMASK_SIZE - 1 {
            return Err(Error::InvalidSyscall { nr });
        }
        self.mask[word] |= 1 << (nr % 32);
        Ok(())
    }

    /// Check whether a syscall is in the bitmask.
    pub fn has_syscall(&self, nr: u32) -> bool {
        let word = (nr / 32) as usize;
        word < AUDIT_BITMASK_SIZE && self.mask[word] & (1 << (nr % 32)) != 0
    }

    /// Match every syscall.
    pub fn set_all_syscalls(&mut self) {
        self.mask = [u32::MAX; AUDIT_BITMASK_SIZE];
    }

    /// Append a numeric field triple.
    pub fn add_field(&mut self, field: AuditField, op: AuditOperator, value: u32) -> Result<()> {
        let idx = self.next_field_index()?;
        self.fields[idx] = field.as_u32();
        self.fieldflags[idx] = op.as_u32();
        self.values[idx] = value;
        self.field_count += 1;
        Ok(())
    }

    /// Append a string-valued field triple.
    ///
    /// The text goes into the trailing buffer and the triple's value is its
    /// length.
    pub fn add_field_str(&mut self, field: AuditField, op: AuditOperator, text: &str) -> Result<()> {
        let idx = self.next_field_index()?;
        self.fields[idx] = field.as_u32();
        self.fieldflags[idx] = op.as_u32();
        self.values[idx] = text.len() as u32;
        self.buf.extend_from_slice(text.as_bytes());
        self.field_count += 1;
        Ok(())
    }

    fn next_field_index(&self) -> Result<usize> {
        let idx = self.field_count as usize;
        if idx >= AUDIT_MAX_FIELDS {
            return Err(Error::TooManyFields {
                max: AUDIT_MAX_FIELDS,
            });
        }
        Ok(idx)
    }

    /// Number of field triples.
    pub fn field_count(&self) -> usize {
        self.field_count as usize
    }

    /// Field triples in insertion order.
    pub fn fields(&self) -> impl Iterator<Item = (AuditField, u32, u32)> + '_ {
        (0..self.field_count()).map(|i| {
            (
                AuditField::from_u32(self.fields[i]),
                self.fieldflags[i],
                self.values[i],
            )
        })
    }

    /// Syscall bitmask words.
    pub fn mask(&self) -> &[u32; AUDIT_BITMASK_SIZE] {
        &self.mask
    }

    /// Trailing string buffer.
    pub fn buf(&self) -> &[u8] {
        &self.buf
    }

    /// Length of the trailing string buffer.
    pub fn buflen(&self) -> u32 {
        self.buf.len() as u32
    }

    /// Total encoded size.
    pub fn encoded_len(&self) -> usize {
        Self::FIXED_SIZE + self.buf.len()
    }

    /// Encode the fixed part followed by the string buffer.
    pub fn encode(&self, codec: &Codec) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        {
            let mut w = codec.writer(&mut out);
            w.u32(self.flags);
            w.u32(self.action);
            w.u32(self.field_count);
            w.u32_slice(&self.mask);
            w.u32_slice(&self.fields);
            w.u32_slice(&self.values);
            w.u32_slice(&self.fieldflags);
            w.u32(self.buflen());
        }
        out.extend_from_slice(&self.buf);
        out
    }

    /// Decode a rule, including its string buffer.
    pub fn decode(codec: &Codec, bytes: &[u8]) -> Result<Self> {
        if bytes.len() < Self::FIXED_SIZE {
            return Err(Error::TruncatedRecord {
                record: "audit_rule_data",
                expected: Self::FIXED_SIZE,
                actual: bytes.len(),
            });
        }

        let mut input = bytes;
        let (mut rule, buflen) = Self::parse_fixed(&mut input, codec.order())
            .map_err(|e| parse_error("audit_rule_data", e))?;

        if rule.field_count as usize > AUDIT_MAX_FIELDS {
            return Err(Error::MalformedMessage(format!(
                "audit_rule_data: field_count {} exceeds {}",
                rule.field_count, AUDIT_MAX_FIELDS
            )));
        }
        if input.len() < buflen {
            return Err(Error::TruncatedRecord {
                record: "audit_rule_data buffer",
                expected: buflen,
                actual: input.len(),
            });
        }
        rule.buf = input[..buflen].to_vec();
        Ok(rule)
    }

    fn parse_fixed(input: &mut &[u8], order: ByteOrder) -> PResult<(Self, usize)> {
        let rule = Self {
            flags: parse_u32(input, order)?,
            action: parse_u32(input, order)?,
            field_count: parse_u32(input, order)?,
            mask: parse_u32_array(input, order)?,
            fields: parse_u32_array(input, order)?,
            values: parse_u32_array(input, order)?,
            fieldflags: parse_u32_array(input, order)?,
            buf: Vec::new(),
        };
        let buflen = parse_u32(input, order)? as usize;
        Ok((rule, buflen))
    }
}
