pub mod appointment_repo;
pub mod chat_repo;
pub mod crew_member_repo;
pub mod notification_repo;
pub mod operator_repo;
pub mod organization_repo;
pub mod push_subscription_repo;

pub use appointment_repo::AppointmentRepo;
pub use chat_repo::ChatRepo;
pub use crew_member_repo::CrewMemberRepo;
pub use notification_repo::NotificationRepo;
pub use operator_repo::OperatorRepo;
pub use organization_repo::OrganizationRepo;
pub use push_subscription_repo::PushSubscriptionRepo;
