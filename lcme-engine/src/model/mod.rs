//! Document Model
//!
//! In-memory BOM graph shared by every stage. The document exclusively owns
//! its packages and relationships; stages borrow it or mutate it in place.

pub mod codec;
pub mod document;
pub mod index;
pub mod spdx_id;

pub use codec::{load, load_file, save_file, serialize, DocumentCodec, Format, JsonCodec, YamlCodec};
pub use document::{Document, Endpoint, ExtraFields, Package, Relationship, NOASSERTION};
pub use index::DocumentIndex;
pub use spdx_id::{
    is_valid_spdx_id, normalize_slug, normalize_spdx_id, slug_of, DEFAULT_DOCUMENT_ID, SPDX_REF_PREFIX,
};
