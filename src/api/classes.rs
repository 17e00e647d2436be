use rocket::State;
use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::{Deserialize, json::Json};
use sqlx::{Pool, Sqlite};
use validator::Validate;

use crate::auth::{Permission, User};
use crate::db::{
    create_class, create_section, create_subject, delete_section, get_class, get_section,
    get_subject, list_classes, list_sections, list_subjects, update_class,
};
use crate::models::{Class, Section, Subject};
use crate::validation::{ApiResult, JsonValidateExt, SUBJECT_CODE_RE};

#[get("/classes")]
pub async fn api_list_classes(_user: User, db: &State<Pool<Sqlite>>) -> ApiResult<Json<Vec<Class>>> {
    Ok(Json(list_classes(db).await?))
}

#[derive(Deserialize, Validate)]
pub struct ClassRequest {
    #[validate(length(min = 1, max = 50, message = "Name must be 1-50 characters"))]
    name: String,
    #[validate(range(min = 0, max = 20, message = "Grade level must be between 0 and 20"))]
    grade_level: i64,
    next_class_id: Option<i64>,
}

#[post("/classes", data = "<request>")]
pub async fn api_create_class(
    request: Json<ClassRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Custom<Json<Class>>> {
    user.require_permission(db, Permission::ManageClasses).await?;
    let validated = request.validate_custom()?;

    let id = create_class(
        db,
        validated.name.trim(),
        validated.grade_level,
        validated.next_class_id,
    )
    .await?;

    Ok(Custom(Status::Created, Json(get_class(db, id).await?)))
}

#[put("/classes/<id>", data = "<request>")]
pub async fn api_update_class(
    id: i64,
    request: Json<ClassRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<Class>> {
    user.require_permission(db, Permission::ManageClasses).await?;
    let validated = request.validate_custom()?;

    update_class(
        db,
        id,
        validated.name.trim(),
        validated.grade_level,
        validated.next_class_id,
    )
    .await?;

    Ok(Json(get_class(db, id).await?))
}

#[get("/classes/<class_id>/sections")]
pub async fn api_list_sections(
    class_id: i64,
    _user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<Vec<Section>>> {
    get_class(db, class_id).await?;
    Ok(Json(list_sections(db, class_id).await?))
}

#[derive(Deserialize, Validate)]
pub struct SectionRequest {
    #[validate(length(min = 1, max = 20, message = "Name must be 1-20 characters"))]
    name: String,
}

#[post("/classes/<class_id>/sections", data = "<request>")]
pub async fn api_create_section(
    class_id: i64,
    request: Json<SectionRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Custom<Json<Section>>> {
    user.require_permission(db, Permission::ManageClasses).await?;
    let validated = request.validate_custom()?;

    let id = create_section(db, class_id, validated.name.trim()).await?;

    Ok(Custom(Status::Created, Json(get_section(db, id).await?)))
}

#[delete("/sections/<id>")]
pub async fn api_delete_section(
    id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Status> {
    user.require_permission(db, Permission::ManageClasses).await?;

    delete_section(db, id).await?;

    Ok(Status::NoContent)
}

#[get("/subjects")]
pub async fn api_list_subjects(
    _user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<Vec<Subject>>> {
    Ok(Json(list_subjects(db).await?))
}

#[derive(Deserialize, Validate)]
pub struct SubjectRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    name: String,
    #[validate(regex(path = *SUBJECT_CODE_RE, message = "Code must look like MATH or PHY101"))]
    code: String,
}

#[post("/subjects", data = "<request>")]
pub async fn api_create_subject(
    request: Json<SubjectRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Custom<Json<Subject>>> {
    user.require_permission(db, Permission::ManageClasses).await?;
    let validated = request.validate_custom()?;

    let id = create_subject(db, validated.name.trim(), &validated.code).await?;

    Ok(Custom(Status::Created, Json(get_subject(db, id).await?)))
}
