mod file;
mod hash;
mod reference;

pub(crate) use self::file::FileRow;
pub(crate) use self::hash::HashRow;
pub(crate) use self::reference::ReferenceRow;
