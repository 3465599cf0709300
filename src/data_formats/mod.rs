pub mod request;
mod response;
mod wrapper;

pub use request::*;
pub use response::*;
pub use wrapper::*;

use serde::{Deserialize, Serialize};

#[derive(Deserialize, Serialize, Debug, Default)]
pub struct PostQueryParams {
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default, rename = "author__username")]
    pub author_username: Option<String>,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub ordering: Option<String>,
    #[serde(default)]
    pub page: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Default)]
pub struct PageQueryParams {
    #[serde(default)]
    pub page: Option<String>,
}
