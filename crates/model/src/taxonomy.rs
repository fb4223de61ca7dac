//! Known library sub-directories.
//!
//! Classification is a plain substring test of a lower-cased, `/`-normalized
//! path against these directories. Every entry ends with a `/` so that
//! `morphs/female/` never matches `morphs/female_genitalia/`.

pub const MORPHS_DIR: &str = "custom/atom/person/morphs/";

pub const FEMALE_MORPHS_DIR: &str = "custom/atom/person/morphs/female/";
pub const FEMALE_GEN_MORPHS_DIR: &str = "custom/atom/person/morphs/female_genitalia/";
pub const MALE_MORPHS_DIR: &str = "custom/atom/person/morphs/male/";
pub const MALE_GEN_MORPHS_DIR: &str = "custom/atom/person/morphs/male_genitalia/";

pub const FEMALE_HAIR_DIR: &str = "custom/hair/female/";
pub const MALE_HAIR_DIR: &str = "custom/hair/male/";

pub const FEMALE_CLOTH_DIR: &str = "custom/clothing/female/";
pub const MALE_CLOTH_DIR: &str = "custom/clothing/male/";
/// Clothing that isn't tied to either gender.
pub const OTHER_CLOTH_DIRS: [&str; 2] = ["custom/clothing/neutral/", "custom/clothing/unisex/"];

/// Sub-folder of a morph directory holding `.fav` markers.
pub const FAVORITES_DIR: &str = "favorites";

pub const MORPH_EXTENSIONS: [&str; 2] = [".vmi", ".vmb"];
pub const CLOTH_OR_HAIR_EXTENSIONS: [&str; 3] = [".vaj", ".vam", ".vab"];
/// Files that can own a sibling preview image.
pub const PREVIEWABLE_EXTENSIONS: [&str; 4] = [".vam", ".var", ".vap", ".vaj"];
pub const PREVIEW_EXTENSIONS: [&str; 3] = [".jpg", ".jpeg", ".png"];
