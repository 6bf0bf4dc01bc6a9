//! SeaORM entity definitions for tracked resources, their archives, and subscriptions

pub mod archive_dynamic_operating_envelope;
pub mod archive_site;
pub mod archive_site_reading;
pub mod archive_tariff_generated_rate;
pub mod dynamic_operating_envelope;
pub mod site;
pub mod site_reading;
pub mod subscription;
pub mod subscription_condition;
pub mod tariff_generated_rate;

pub mod prelude {
    pub use super::archive_dynamic_operating_envelope::Entity as ArchiveDynamicOperatingEnvelope;
    pub use super::archive_site::Entity as ArchiveSite;
    pub use super::archive_site_reading::Entity as ArchiveSiteReading;
    pub use super::archive_tariff_generated_rate::Entity as ArchiveTariffGeneratedRate;
    pub use super::dynamic_operating_envelope::Entity as DynamicOperatingEnvelope;
    pub use super::site::Entity as Site;
    pub use super::site_reading::Entity as SiteReading;
    pub use super::subscription::Entity as Subscription;
    pub use super::subscription_condition::Entity as SubscriptionCondition;
    pub use super::tariff_generated_rate::Entity as TariffGeneratedRate;
}
