pub mod commission;
pub mod discipline;
pub mod notification_read;
pub mod order;
pub mod order_item;
pub mod partner;
pub mod royalty;
pub mod stock_movement;
pub mod user;
pub mod work;

pub use commission::Entity as Commission;
pub use discipline::Entity as Discipline;
pub use notification_read::Entity as NotificationRead;
pub use order::Entity as Order;
pub use order_item::Entity as OrderItem;
pub use partner::Entity as Partner;
pub use royalty::Entity as Royalty;
pub use stock_movement::Entity as StockMovement;
pub use user::Entity as User;
pub use work::Entity as Work;
