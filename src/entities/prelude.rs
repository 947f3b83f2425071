pub use super::subscriptions::Entity as Subscriptions;
