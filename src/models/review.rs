use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user_id: String,
    pub user_name: String,
    pub course_id: String,
    pub rating: i32,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateReview {
    #[validate(length(min = 1, message = "Course id is required"))]
    pub course_id: String,

    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating: i32,

    #[serde(default)]
    #[validate(length(max = 2000))]
    pub comment: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseReviews {
    pub course_id: String,
    pub average_rating: f64,
    pub count: usize,
    pub reviews: Vec<Review>,
}

impl CourseReviews {
    pub fn new(course_id: String, reviews: Vec<Review>) -> Self {
        let count = reviews.len();
        let average_rating = if count == 0 {
            0.0
        } else {
            reviews.iter().map(|r| r.rating as f64).sum::<f64>() / count as f64
        };
        CourseReviews { course_id, average_rating, count, reviews }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn review(rating: i32) -> Review {
        Review {
            id: None,
            user_id: "u".into(),
            user_name: "Learner".into(),
            course_id: "c".into(),
            rating,
            comment: String::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_average_rating() {
        let summary = CourseReviews::new("c".into(), vec![review(5), review(4), review(3)]);
        assert_eq!(summary.count, 3);
        assert_eq!(summary.average_rating, 4.0);
    }

    #[test]
    fn test_no_reviews() {
        let summary = CourseReviews::new("c".into(), vec![]);
        assert_eq!(summary.average_rating, 0.0);
    }

    #[test]
    fn test_rating_range() {
        let payload = CreateReview { course_id: "c".into(), rating: 6, comment: String::new() };
        assert!(payload.validate().is_err());
        let payload = CreateReview { course_id: "c".into(), rating: 5, comment: String::new() };
        assert!(payload.validate().is_ok());
    }
}
