//! Compression parameter set.
//!
//! A [`ParameterSet`] is built from a level preset and then adjusted with
//! builder methods. It is validated once when a session starts and is
//! immutable afterwards.
//!
//! ```rust
//! use lzscope_lzma2::params::{MatchFinderKind, Mode, ParameterSet};
//!
//! let params = ParameterSet::preset(6)
//!     .unwrap()
//!     .dict_size(64 * 1024)
//!     .lc(4)
//!     .lp(0)
//!     .mode(Mode::Fast)
//!     .match_finder(MatchFinderKind::Hc4);
//! assert!(params.validate().is_ok());
//! ```

use crate::model::{LzmaProperties, MATCH_LEN_MAX, MATCH_LEN_MIN};
use lzscope_core::error::{LzScopeError, Result};
use std::fmt;

/// Smallest accepted dictionary size (4 KiB).
pub const DICT_SIZE_MIN: u32 = 4096;

/// Largest accepted dictionary size (1.5 GiB).
pub const DICT_SIZE_MAX: u32 = 1536 << 20;

/// Highest preset level.
pub const LEVEL_MAX: u8 = 9;

/// Default preset level.
pub const LEVEL_DEFAULT: u8 = 6;

/// Upper bound for lc, lp and pb individually.
pub const PROP_BITS_MAX: u32 = 4;

/// Upper bound for lc + lp.
pub const LC_LP_MAX: u32 = 4;

/// Upper bound for an explicit search depth.
pub const DEPTH_MAX: u32 = 100;

/// Dictionary size exponent for each preset level.
const PRESET_DICT_POW2: [u32; 10] = [18, 20, 21, 22, 22, 23, 23, 24, 25, 26];

/// Search depth for the fast presets (levels 0-3).
const PRESET_FAST_DEPTH: [u32; 4] = [4, 8, 24, 48];

/// Parsing strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Greedy parsing with a capped number of candidates per position.
    Fast,
    /// Lazy parsing with one position of lookahead.
    #[default]
    Normal,
}

impl Mode {
    /// Lowercase name used in reports and on the command line.
    pub fn name(self) -> &'static str {
        match self {
            Self::Fast => "fast",
            Self::Normal => "normal",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Match finder strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchFinderKind {
    /// Hash chain keyed on 3 bytes.
    Hc3,
    /// Hash chain keyed on 4 bytes.
    Hc4,
    /// Binary tree keyed on 2 bytes.
    Bt2,
    /// Binary tree keyed on 3 bytes.
    Bt3,
    /// Binary tree keyed on 4 bytes.
    Bt4,
}

impl MatchFinderKind {
    /// All match finders, in increasing strength.
    pub const ALL: [Self; 5] = [Self::Hc3, Self::Hc4, Self::Bt2, Self::Bt3, Self::Bt4];

    /// Number of bytes hashed to find candidate positions.
    pub fn hash_bytes(self) -> usize {
        match self {
            Self::Bt2 => 2,
            Self::Hc3 | Self::Bt3 => 3,
            Self::Hc4 | Self::Bt4 => 4,
        }
    }

    /// Whether this is a binary tree finder.
    pub fn is_binary_tree(self) -> bool {
        matches!(self, Self::Bt2 | Self::Bt3 | Self::Bt4)
    }

    /// Search depth used when the configured depth is 0.
    pub fn auto_depth(self, nice_len: u32) -> u32 {
        if self.is_binary_tree() {
            16 + nice_len / 2
        } else {
            4 + nice_len / 4
        }
    }

    /// Lowercase name used in reports and on the command line.
    pub fn name(self) -> &'static str {
        match self {
            Self::Hc3 => "hc3",
            Self::Hc4 => "hc4",
            Self::Bt2 => "bt2",
            Self::Bt3 => "bt3",
            Self::Bt4 => "bt4",
        }
    }
}

impl fmt::Display for MatchFinderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Complete configuration for one compression session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParameterSet {
    /// Preset level the set was derived from (0-9).
    pub level: u8,
    /// Dictionary size in bytes.
    pub dict_size: u32,
    /// Literal context bits.
    pub lc: u32,
    /// Literal position bits.
    pub lp: u32,
    /// Position bits.
    pub pb: u32,
    /// Parsing strategy.
    pub mode: Mode,
    /// Match length at which searching stops early.
    pub nice_len: u32,
    /// Match finder strategy.
    pub match_finder: MatchFinderKind,
    /// Maximum candidates examined per position (0 = automatic).
    pub depth: u32,
}

impl ParameterSet {
    /// Parameters of a preset level.
    pub fn preset(level: u8) -> Result<Self> {
        if level > LEVEL_MAX {
            return Err(LzScopeError::invalid_parameters(
                "level",
                format!("level {} is not in 0..={}", level, LEVEL_MAX),
            ));
        }
        Ok(Self::preset_table(level))
    }

    fn preset_table(level: u8) -> Self {
        let idx = level as usize;
        let (mode, match_finder, nice_len, depth) = if level <= 3 {
            let mf = if level == 0 {
                MatchFinderKind::Hc3
            } else {
                MatchFinderKind::Hc4
            };
            let nice = if level <= 1 { 128 } else { 273 };
            (Mode::Fast, mf, nice, PRESET_FAST_DEPTH[idx])
        } else {
            let nice = match level {
                4 => 16,
                5 => 32,
                _ => 64,
            };
            (Mode::Normal, MatchFinderKind::Bt4, nice, 0)
        };

        Self {
            level,
            dict_size: 1 << PRESET_DICT_POW2[idx],
            lc: 3,
            lp: 0,
            pb: 2,
            mode,
            nice_len,
            match_finder,
            depth,
        }
    }

    /// Set the dictionary size in bytes.
    #[must_use]
    pub fn dict_size(mut self, dict_size: u32) -> Self {
        self.dict_size = dict_size;
        self
    }

    /// Set the literal context bits.
    #[must_use]
    pub fn lc(mut self, lc: u32) -> Self {
        self.lc = lc;
        self
    }

    /// Set the literal position bits.
    #[must_use]
    pub fn lp(mut self, lp: u32) -> Self {
        self.lp = lp;
        self
    }

    /// Set the position bits.
    #[must_use]
    pub fn pb(mut self, pb: u32) -> Self {
        self.pb = pb;
        self
    }

    /// Set the parsing strategy.
    #[must_use]
    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the nice match length.
    #[must_use]
    pub fn nice_len(mut self, nice_len: u32) -> Self {
        self.nice_len = nice_len;
        self
    }

    /// Set the match finder.
    #[must_use]
    pub fn match_finder(mut self, match_finder: MatchFinderKind) -> Self {
        self.match_finder = match_finder;
        self
    }

    /// Set the search depth (0 = automatic).
    #[must_use]
    pub fn depth(mut self, depth: u32) -> Self {
        self.depth = depth;
        self
    }

    /// Check every range and the lc + lp constraint.
    pub fn validate(&self) -> Result<()> {
        if self.level > LEVEL_MAX {
            return Err(LzScopeError::invalid_parameters(
                "level",
                format!("level {} is not in 0..={}", self.level, LEVEL_MAX),
            ));
        }
        if !(DICT_SIZE_MIN..=DICT_SIZE_MAX).contains(&self.dict_size) {
            return Err(LzScopeError::invalid_parameters(
                "dict_size",
                format!(
                    "dictionary size {} is not in {}..={}",
                    self.dict_size, DICT_SIZE_MIN, DICT_SIZE_MAX
                ),
            ));
        }
        for (name, value) in [("lc", self.lc), ("lp", self.lp), ("pb", self.pb)] {
            if value > PROP_BITS_MAX {
                return Err(LzScopeError::invalid_parameters(
                    name,
                    format!("{} = {} is not in 0..={}", name, value, PROP_BITS_MAX),
                ));
            }
        }
        if self.lc + self.lp > LC_LP_MAX {
            return Err(LzScopeError::invalid_parameters(
                "lc+lp",
                format!(
                    "lc ({}) + lp ({}) must not exceed {}",
                    self.lc, self.lp, LC_LP_MAX
                ),
            ));
        }
        if !(1..=MATCH_LEN_MAX as u32).contains(&self.nice_len) {
            return Err(LzScopeError::invalid_parameters(
                "nice_len",
                format!(
                    "nice length {} is not in 1..={}",
                    self.nice_len, MATCH_LEN_MAX
                ),
            ));
        }
        if self.depth > DEPTH_MAX {
            return Err(LzScopeError::invalid_parameters(
                "depth",
                format!("depth {} is not in 0..={}", self.depth, DEPTH_MAX),
            ));
        }
        Ok(())
    }

    /// The lc/lp/pb triple.
    pub fn properties(&self) -> LzmaProperties {
        LzmaProperties::new(self.lc, self.lp, self.pb)
    }

    /// Nice length as used by the match finder (never below the minimum match).
    pub fn effective_nice_len(&self) -> usize {
        (self.nice_len as usize).max(MATCH_LEN_MIN)
    }

    /// Search depth with the automatic value resolved.
    pub fn effective_depth(&self) -> u32 {
        if self.depth == 0 {
            self.match_finder.auto_depth(self.nice_len)
        } else {
            self.depth
        }
    }
}

impl Default for ParameterSet {
    fn default() -> Self {
        Self::preset_table(LEVEL_DEFAULT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_level_six() {
        let params = ParameterSet::default();
        assert_eq!(params.level, 6);
        assert_eq!(params.dict_size, 8 << 20);
        assert_eq!((params.lc, params.lp, params.pb), (3, 0, 2));
        assert_eq!(params.mode, Mode::Normal);
        assert_eq!(params.match_finder, MatchFinderKind::Bt4);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_all_presets_valid() {
        for level in 0..=LEVEL_MAX {
            let params = ParameterSet::preset(level).unwrap();
            assert!(params.validate().is_ok(), "level {}", level);
            assert_eq!(params.level, level);
        }
    }

    #[test]
    fn test_fast_presets() {
        let p0 = ParameterSet::preset(0).unwrap();
        assert_eq!(p0.match_finder, MatchFinderKind::Hc3);
        assert_eq!(p0.mode, Mode::Fast);
        assert_eq!(p0.dict_size, 256 * 1024);
        let p3 = ParameterSet::preset(3).unwrap();
        assert_eq!(p3.match_finder, MatchFinderKind::Hc4);
        assert_eq!(p3.nice_len, 273);
        assert_eq!(p3.depth, 48);
    }

    #[test]
    fn test_invalid_level() {
        assert!(matches!(
            ParameterSet::preset(10),
            Err(LzScopeError::InvalidParameters {
                parameter: "level",
                ..
            })
        ));
    }

    #[test]
    fn test_lc_lp_sum() {
        let params = ParameterSet::default().lc(3).lp(2);
        let err = params.validate().unwrap_err();
        assert!(matches!(
            err,
            LzScopeError::InvalidParameters {
                parameter: "lc+lp",
                ..
            }
        ));

        assert!(ParameterSet::default().lc(4).lp(0).validate().is_ok());
        assert!(ParameterSet::default().lc(0).lp(4).validate().is_ok());
    }

    #[test]
    fn test_dict_size_bounds() {
        assert!(ParameterSet::default().dict_size(4095).validate().is_err());
        assert!(ParameterSet::default().dict_size(4096).validate().is_ok());
        assert!(ParameterSet::default().dict_size(DICT_SIZE_MAX).validate().is_ok());
        assert!(
            ParameterSet::default()
                .dict_size(DICT_SIZE_MAX + 1)
                .validate()
                .is_err()
        );
    }

    #[test]
    fn test_individual_ranges() {
        assert!(ParameterSet::default().pb(5).validate().is_err());
        assert!(ParameterSet::default().lc(5).validate().is_err());
        assert!(ParameterSet::default().nice_len(0).validate().is_err());
        assert!(ParameterSet::default().nice_len(274).validate().is_err());
        assert!(ParameterSet::default().nice_len(273).validate().is_ok());
        assert!(ParameterSet::default().depth(101).validate().is_err());
        assert!(ParameterSet::default().depth(100).validate().is_ok());
    }

    #[test]
    fn test_effective_values() {
        let params = ParameterSet::default().nice_len(1).depth(0);
        assert_eq!(params.effective_nice_len(), 2);
        assert_eq!(params.effective_depth(), 16);

        let hc = ParameterSet::default()
            .match_finder(MatchFinderKind::Hc4)
            .nice_len(64);
        assert_eq!(hc.effective_depth(), 20);
        assert_eq!(hc.depth(7).effective_depth(), 7);
    }

    #[test]
    fn test_properties_byte() {
        let params = ParameterSet::default();
        assert_eq!(params.properties().to_byte(), 0x5D);
    }
}
