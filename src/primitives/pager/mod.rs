#![forbid(unsafe_code)]

mod meta;
mod pager;

pub use meta::{
    select_meta, Meta, MetaCandidate, MetaRejection, CHECKSUMMED_LEN, MAGIC, META_LEN,
    META_PAGE_PREFIX, VERSION,
};
pub use pager::{PageBuf, Pager, PagerOptions};
