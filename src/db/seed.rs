use chrono::Utc;
use log::info;

use super::Repository;
use crate::models::{Resource, ResourceStatus, ResourceType, Role, User, UserStatus};

pub struct SeedUser {
    pub username: &'static str,
    pub email: &'static str,
    pub password: &'static str,
    pub role: Role,
    pub employee_id: Option<&'static str>,
    pub roll_number: Option<&'static str>,
}

pub const SEED_USERS: [SeedUser; 4] = [
    SeedUser {
        username: "Dr. Arun (HOD)",
        email: "hod@campus.edu",
        password: "Admin@123",
        role: Role::Admin,
        employee_id: Some("HOD001"),
        roll_number: None,
    },
    SeedUser {
        username: "Prof. Radha",
        email: "prof.radha@campus.edu",
        password: "Staff@123",
        role: Role::Staff,
        employee_id: Some("FAC101"),
        roll_number: None,
    },
    SeedUser {
        username: "Mr. Kumar",
        email: "incharge.kumar@campus.edu",
        password: "Kumar@123",
        role: Role::LabIncharge,
        employee_id: Some("LAB201"),
        roll_number: None,
    },
    SeedUser {
        username: "Gokul Student",
        email: "gokul@edu.in",
        password: "Gokul@123",
        role: Role::Student,
        employee_id: None,
        roll_number: Some("21CS042"),
    },
];

pub fn new_user(username: &str, email: &str, password_hash: String, role: Role) -> User {
    User {
        id: 0,
        username: username.to_string(),
        email: email.to_lowercase(),
        password: password_hash,
        phone: None,
        role,
        status: UserStatus::Active,
        department: None,
        roll_number: None,
        employee_id: None,
        designation: None,
        failed_login_attempts: 0,
        last_failed_login_at: None,
        account_locked_until: None,
        current_session: None,
        created_at: Utc::now(),
    }
}

/// Populates an empty store with the demo campus. `force` seeds even when
/// users exist; existing emails are skipped either way.
pub async fn seed(repo: &dyn Repository, force: bool, bcrypt_cost: u32) -> Result<(), Box<dyn std::error::Error>> {
    if !force && repo.count_users().await? > 0 {
        info!("Store already populated, skipping seed");
        return Ok(());
    }

    info!("🌱 Seeding campus users and resources...");
    let mut ids = Vec::with_capacity(SEED_USERS.len());
    for seed in &SEED_USERS {
        if let Some(existing) = repo.find_user_by_email(seed.email).await? {
            ids.push(existing.id);
            continue;
        }
        let mut user = new_user(
            seed.username,
            seed.email,
            bcrypt::hash(seed.password, bcrypt_cost)?,
            seed.role,
        );
        user.employee_id = seed.employee_id.map(str::to_string);
        user.roll_number = seed.roll_number.map(str::to_string);
        user.department = Some("Computer Science".to_string());
        let user = repo.insert_user(user).await?;
        info!("Created {}: {}", user.role, user.email);
        ids.push(user.id);
    }
    let (staff, incharge) = (ids[1], ids[2]);

    let existing: Vec<String> = repo
        .list_resources()
        .await?
        .into_iter()
        .map(|r| r.name)
        .collect();
    let resources = [
        ("Advanced Physics Lab", ResourceType::Lab, 30, Some(incharge), None),
        ("Computing Center 01", ResourceType::Lab, 60, Some(incharge), None),
        ("Seminar Hall B", ResourceType::EventHall, 150, None, None),
        ("Main Conference Room", ResourceType::MeetingRoom, 20, None, Some(staff)),
        ("Smart Classroom 302", ResourceType::Classroom, 50, None, None),
    ];
    for (name, kind, capacity, lab_in_charge, assigned_staff) in resources {
        if existing.iter().any(|n| n == name) {
            continue;
        }
        repo.insert_resource(Resource {
            id: 0,
            name: name.to_string(),
            kind,
            capacity,
            status: ResourceStatus::Active,
            lab_in_charge,
            assigned_staff,
        })
        .await?;
        info!("Created resource: {}", name);
    }

    info!("✅ Seeding complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;

    #[actix_rt::test]
    async fn seeds_once() {
        let store = MemoryStore::new();
        seed(&store, false, 4).await.unwrap();
        seed(&store, false, 4).await.unwrap();
        assert_eq!(store.count_users().await.unwrap(), 4);
        assert_eq!(store.count_resources().await.unwrap(), 5);

        let labs = store.managed_labs(3).await.unwrap();
        assert_eq!(labs.len(), 2);
    }

    #[actix_rt::test]
    async fn forced_seed_does_not_duplicate() {
        let store = MemoryStore::new();
        seed(&store, true, 4).await.unwrap();
        seed(&store, true, 4).await.unwrap();
        assert_eq!(store.count_users().await.unwrap(), 4);
        assert_eq!(store.count_resources().await.unwrap(), 5);
    }
}
