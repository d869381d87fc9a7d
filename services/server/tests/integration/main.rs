mod claim_test;
mod helpers;
mod notification_test;
