pub use super::accountants::Entity as Accountants;
pub use super::api_keys::Entity as ApiKeys;
pub use super::automation_queue::Entity as AutomationQueue;
pub use super::invoices::Entity as Invoices;
pub use super::profiles::Entity as Profiles;
pub use super::subscriptions::Entity as Subscriptions;
pub use super::workflows::Entity as Workflows;
