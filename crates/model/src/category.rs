//! Asset classification.
//!
//! [`classify`] is a pure, total function: every `(extension, path)` pair maps
//! onto exactly one [`AssetKind`], and the kind expands into an
//! [`AssetCategory`] bit-set carrying every coarse tag it implies.

use crate::path;
use crate::taxonomy::{
    CLOTH_OR_HAIR_EXTENSIONS, FEMALE_CLOTH_DIR, FEMALE_GEN_MORPHS_DIR, FEMALE_HAIR_DIR, FEMALE_MORPHS_DIR,
    MALE_CLOTH_DIR, MALE_GEN_MORPHS_DIR, MALE_HAIR_DIR, MALE_MORPHS_DIR, MORPH_EXTENSIONS, OTHER_CLOTH_DIRS,
};
use bitflags::bitflags;
use std::fmt::{Display, Formatter, Result as FmtResult};

bitflags! {
    /// Semantic category of an asset. Not mutually exclusive.
    ///
    /// The empty set is the "unknown" category. A classified file has exactly
    /// one of the specific bits set (see [`AssetCategory::SPECIFIC`]) plus all
    /// coarse tags implied by it.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct AssetCategory: u32 {
        // Specific kinds.
        const FEMALE_NORMAL_MORPH = 1 << 0;
        const FEMALE_GEN_MORPH = 1 << 1;
        const MALE_NORMAL_MORPH = 1 << 2;
        const MALE_GEN_MORPH = 1 << 3;
        const UNKNOWN_MORPH = 1 << 4;
        const FEMALE_HAIR = 1 << 5;
        const MALE_HAIR = 1 << 6;
        const FEMALE_CLOTH = 1 << 7;
        const MALE_CLOTH = 1 << 8;
        const OTHER_CLOTH = 1 << 9;
        const UNKNOWN_CLOTH_OR_HAIR = 1 << 10;

        // Coarse tags.
        const FEMALE_MORPH = 1 << 16;
        const MALE_MORPH = 1 << 17;
        const MORPH = 1 << 18;
        const VALID_MORPH = 1 << 19;
        const HAIR = 1 << 20;
        const VALID_HAIR = 1 << 21;
        const CLOTH = 1 << 22;
        const VALID_CLOTH = 1 << 23;
        const VALID_CLOTH_OR_HAIR = 1 << 24;
        const VALID_CLOTH_OR_HAIR_OR_MORPH = 1 << 25;

        // Gender subsets, made of specific bits only.
        const FEMALE = Self::FEMALE_NORMAL_MORPH.bits()
            | Self::FEMALE_GEN_MORPH.bits()
            | Self::FEMALE_HAIR.bits()
            | Self::FEMALE_CLOTH.bits();
        const MALE = Self::MALE_NORMAL_MORPH.bits()
            | Self::MALE_GEN_MORPH.bits()
            | Self::MALE_HAIR.bits()
            | Self::MALE_CLOTH.bits();
        const SPECIFIC = (1 << 11) - 1;
    }
}

impl AssetCategory {
    pub const UNKNOWN: Self = Self::empty();

    pub fn is_female(&self) -> bool {
        self.intersects(Self::FEMALE)
    }

    pub fn is_male(&self) -> bool {
        self.intersects(Self::MALE)
    }

    pub fn is_valid_morph(&self) -> bool {
        self.contains(Self::VALID_MORPH)
    }

    /// The specific kind this category was expanded from, if exactly one
    /// specific bit is set.
    pub fn kind(&self) -> Option<AssetKind> {
        AssetKind::ALL.into_iter().find(|kind| (*self & Self::SPECIFIC) == kind.specific_bit())
    }
}

/// The single specific outcome of a classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetKind {
    FemaleNormalMorph,
    FemaleGenMorph,
    MaleNormalMorph,
    MaleGenMorph,
    UnknownMorph,
    FemaleHair,
    MaleHair,
    FemaleCloth,
    MaleCloth,
    OtherCloth,
    UnknownClothOrHair,
}
impl AssetKind {
    pub const ALL: [AssetKind; 11] = [
        Self::FemaleNormalMorph,
        Self::FemaleGenMorph,
        Self::MaleNormalMorph,
        Self::MaleGenMorph,
        Self::UnknownMorph,
        Self::FemaleHair,
        Self::MaleHair,
        Self::FemaleCloth,
        Self::MaleCloth,
        Self::OtherCloth,
        Self::UnknownClothOrHair,
    ];

    fn specific_bit(self) -> AssetCategory {
        match self {
            Self::FemaleNormalMorph => AssetCategory::FEMALE_NORMAL_MORPH,
            Self::FemaleGenMorph => AssetCategory::FEMALE_GEN_MORPH,
            Self::MaleNormalMorph => AssetCategory::MALE_NORMAL_MORPH,
            Self::MaleGenMorph => AssetCategory::MALE_GEN_MORPH,
            Self::UnknownMorph => AssetCategory::UNKNOWN_MORPH,
            Self::FemaleHair => AssetCategory::FEMALE_HAIR,
            Self::MaleHair => AssetCategory::MALE_HAIR,
            Self::FemaleCloth => AssetCategory::FEMALE_CLOTH,
            Self::MaleCloth => AssetCategory::MALE_CLOTH,
            Self::OtherCloth => AssetCategory::OTHER_CLOTH,
            Self::UnknownClothOrHair => AssetCategory::UNKNOWN_CLOTH_OR_HAIR,
        }
    }

    fn implied(self) -> AssetCategory {
        use AssetCategory as C;
        let valid_morph = C::MORPH | C::VALID_MORPH | C::VALID_CLOTH_OR_HAIR_OR_MORPH;
        let valid_hair = C::HAIR | C::VALID_HAIR | C::VALID_CLOTH_OR_HAIR | C::VALID_CLOTH_OR_HAIR_OR_MORPH;
        let valid_cloth = C::CLOTH | C::VALID_CLOTH | C::VALID_CLOTH_OR_HAIR | C::VALID_CLOTH_OR_HAIR_OR_MORPH;
        match self {
            Self::FemaleNormalMorph | Self::FemaleGenMorph => valid_morph | C::FEMALE_MORPH,
            Self::MaleNormalMorph | Self::MaleGenMorph => valid_morph | C::MALE_MORPH,
            Self::UnknownMorph => C::MORPH,
            Self::FemaleHair | Self::MaleHair => valid_hair,
            Self::FemaleCloth | Self::MaleCloth | Self::OtherCloth => valid_cloth,
            Self::UnknownClothOrHair => C::empty(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FemaleNormalMorph => "female morph",
            Self::FemaleGenMorph => "female genital morph",
            Self::MaleNormalMorph => "male morph",
            Self::MaleGenMorph => "male genital morph",
            Self::UnknownMorph => "unknown morph",
            Self::FemaleHair => "female hair",
            Self::MaleHair => "male hair",
            Self::FemaleCloth => "female clothing",
            Self::MaleCloth => "male clothing",
            Self::OtherCloth => "clothing",
            Self::UnknownClothOrHair => "unknown clothing or hair",
        }
    }
}
impl From<AssetKind> for AssetCategory {
    fn from(kind: AssetKind) -> Self {
        kind.specific_bit() | kind.implied()
    }
}
impl Display for AssetKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

/// Classifies a file from its extension and logical path.
///
/// The extension may be given with or without its leading dot, in any case.
/// Directory checks are case-insensitive substring tests against the
/// [`taxonomy`](crate::taxonomy), genital directories first.
///
/// ```
/// use vamlib_model::{AssetCategory, AssetKind, classify};
/// let category = classify(".vmi", "Custom/Atom/Person/Morphs/female/Smile.vmi");
/// assert_eq!(category, AssetKind::FemaleNormalMorph.into());
/// assert!(category.contains(AssetCategory::VALID_MORPH));
/// assert_eq!(classify(".txt", "readme.txt"), AssetCategory::UNKNOWN);
/// ```
pub fn classify(extension: impl AsRef<str>, logical_path: impl AsRef<str>) -> AssetCategory {
    let extension = extension.as_ref().trim_start_matches('.').to_lowercase();
    let extension = format!(".{extension}");
    let lowered = path::key(logical_path);
    let within = |dir: &str| lowered.contains(dir);

    if MORPH_EXTENSIONS.contains(&extension.as_str()) {
        let kind = if within(FEMALE_GEN_MORPHS_DIR) {
            AssetKind::FemaleGenMorph
        } else if within(MALE_GEN_MORPHS_DIR) {
            AssetKind::MaleGenMorph
        } else if within(FEMALE_MORPHS_DIR) {
            AssetKind::FemaleNormalMorph
        } else if within(MALE_MORPHS_DIR) {
            AssetKind::MaleNormalMorph
        } else {
            AssetKind::UnknownMorph
        };
        return kind.into();
    }
    if CLOTH_OR_HAIR_EXTENSIONS.contains(&extension.as_str()) {
        let kind = if within(FEMALE_HAIR_DIR) {
            AssetKind::FemaleHair
        } else if within(MALE_HAIR_DIR) {
            AssetKind::MaleHair
        } else if within(FEMALE_CLOTH_DIR) {
            AssetKind::FemaleCloth
        } else if within(MALE_CLOTH_DIR) {
            AssetKind::MaleCloth
        } else if OTHER_CLOTH_DIRS.iter().any(|dir| within(dir)) {
            AssetKind::OtherCloth
        } else {
            AssetKind::UnknownClothOrHair
        };
        return kind.into();
    }
    AssetCategory::UNKNOWN
}
