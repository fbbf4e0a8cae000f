pub mod activity;
pub mod auth;
pub mod booking;
pub mod meeting;
pub mod resource;
pub mod user;

// Re-export all the models that are used in other modules
pub use activity::{AuditLog, AuditLogResponse, Notification, NotificationPatch, NotificationResponse};
pub use auth::{AuthResponse, AuthUser, LoginRequest, RefreshRequest, RefreshResponse, SignupRequest};
pub use booking::{
    AvailabilityQuery, Booking, BookingResponse, BookingStatus, BookingType, BusySlot,
    CreateBookingRequest, DecisionRequest, DecisionResponse,
};
pub use meeting::{CreateMeetingRequest, MeetingResponse, MeetingSchedule};
pub use resource::{Resource, ResourcePayload, ResourceResponse, ResourceStatus, ResourceType};
pub use user::{
    Claims, DashboardStats, Role, StudentStats, TokenKind, UpdateUserRequest, User, UserResponse,
    UserStatus,
};
