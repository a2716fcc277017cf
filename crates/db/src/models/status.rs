//! Status helper enums mapping to SMALLSERIAL/SMALLINT lookup tables.
//!
//! Each enum variant's discriminant matches the seed data order (1-based)
//! in the corresponding `*_statuses` database table.

/// Status ID type matching SMALLINT/SMALLSERIAL in the database.
pub type StatusId = i16;

macro_rules! define_status_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $val:expr ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[repr(i16)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $val ),+
        }

        impl $name {
            /// Return the database status ID.
            pub fn id(self) -> StatusId {
                self as StatusId
            }
        }

        impl From<$name> for StatusId {
            fn from(value: $name) -> Self {
                value as StatusId
            }
        }
    };
}

define_status_enum! {
    /// Recording segment lifecycle status.
    RecordingStatus {
        /// Segment believed still open.
        Recording = 1,
        /// Segment closed and fully described.
        Completed = 2,
        /// Segment abandoned: file never materialized, or unrecoverable.
        Failed = 3,
    }
}

define_status_enum! {
    /// Upload pipeline status. Owned by the upload pipeline; this engine
    /// only reads it to skip rows that already left local storage.
    UploadStatus {
        Pending = 1,
        Uploading = 2,
        Uploaded = 3,
        Failed = 4,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_status_ids_match_seed_data() {
        assert_eq!(RecordingStatus::Recording.id(), 1);
        assert_eq!(RecordingStatus::Completed.id(), 2);
        assert_eq!(RecordingStatus::Failed.id(), 3);
    }

    #[test]
    fn upload_status_ids_match_seed_data() {
        assert_eq!(UploadStatus::Pending.id(), 1);
        assert_eq!(UploadStatus::Uploading.id(), 2);
        assert_eq!(UploadStatus::Uploaded.id(), 3);
        assert_eq!(UploadStatus::Failed.id(), 4);
    }

    #[test]
    fn status_into_status_id() {
        let id: StatusId = RecordingStatus::Completed.into();
        assert_eq!(id, 2);
    }
}
