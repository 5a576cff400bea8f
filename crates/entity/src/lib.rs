pub mod activity;
pub mod app_user;
pub mod contact;
pub mod deal;
pub mod deal_stage_history;
pub mod lead;
pub mod meeting;
pub mod user_role;
pub mod user_secret;
