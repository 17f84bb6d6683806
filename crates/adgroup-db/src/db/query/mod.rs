pub mod ad_group;
pub mod membership;
pub mod user_group;
