#[cfg(test)]
mod tests {
    use rocket::tokio;

    use crate::auth::Role;
    use crate::db::*;
    use crate::error::AppError;
    use crate::models::{
        AttendanceStatus, CertificateKind, FeedbackStatus, PaymentMethod, PromotionOutcome,
        StudentStatus,
    };
    use crate::test::test_utils::{TestDb, TestDbBuilder, create_standard_test_db, date};

    async fn active_ids(test_db: &TestDb) -> Vec<i64> {
        list_academic_sessions(&test_db.pool)
            .await
            .unwrap()
            .into_iter()
            .filter(|s| s.is_active)
            .map(|s| s.id)
            .collect()
    }

    #[tokio::test]
    async fn test_activation_leaves_exactly_one_active_session() {
        let test_db = create_standard_test_db().await;
        let current = test_db.session_id("2025-26");
        let next = test_db.session_id("2026-27");

        assert_eq!(active_ids(&test_db).await, vec![current]);

        let activated = activate_academic_session(&test_db.pool, next).await.unwrap();
        assert!(activated.is_active);
        assert_eq!(active_ids(&test_db).await, vec![next]);

        // Re-activating the active session changes nothing.
        activate_academic_session(&test_db.pool, next).await.unwrap();
        assert_eq!(active_ids(&test_db).await, vec![next]);
    }

    #[tokio::test]
    async fn test_activating_unknown_session_keeps_previous_active() {
        let test_db = create_standard_test_db().await;
        let current = test_db.session_id("2025-26");

        let result = activate_academic_session(&test_db.pool, 9999).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
        assert_eq!(active_ids(&test_db).await, vec![current]);
    }

    #[tokio::test]
    async fn test_session_validation_and_deletion() {
        let test_db = create_standard_test_db().await;

        let result =
            create_academic_session(&test_db.pool, "Backwards", date(2027, 3, 1), date(2027, 1, 1))
                .await;
        assert!(matches!(result, Err(AppError::Validation(_))));

        let result =
            create_academic_session(&test_db.pool, "2025-26", date(2030, 1, 1), date(2030, 6, 1))
                .await;
        assert!(matches!(result, Err(AppError::Conflict(_))));

        // Active session cannot go, nor can one with enrolments.
        let result = delete_academic_session(&test_db.pool, test_db.session_id("2025-26")).await;
        assert!(matches!(result, Err(AppError::Conflict(_))));

        delete_academic_session(&test_db.pool, test_db.session_id("2026-27"))
            .await
            .unwrap();
        assert_eq!(list_academic_sessions(&test_db.pool).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_class_chain_rules() {
        let test_db = create_standard_test_db().await;
        let grade_1 = test_db.class_id("Grade 1");
        let grade_2 = test_db.class_id("Grade 2");
        let grade_3 = test_db.class_id("Grade 3");

        let result = update_class(&test_db.pool, grade_2, "Grade 2", 2, Some(grade_2)).await;
        assert!(matches!(result, Err(AppError::Validation(_))));

        // Grade 3 pointing back at Grade 1 would form a cycle.
        let result = update_class(&test_db.pool, grade_3, "Grade 3", 3, Some(grade_1)).await;
        assert!(matches!(result, Err(AppError::Validation(_))));

        // Dropping Grade 2 below Grade 1 breaks the link into it.
        let result = update_class(&test_db.pool, grade_2, "Grade 2", 0, Some(grade_3)).await;
        assert!(matches!(result, Err(AppError::Validation(_))));

        let result = create_class(&test_db.pool, "Nursery", 0, Some(9999)).await;
        assert!(matches!(result, Err(AppError::Validation(_))));

        let nursery = create_class(&test_db.pool, "Nursery", 0, Some(grade_1)).await.unwrap();
        let class = get_class(&test_db.pool, nursery).await.unwrap();
        assert_eq!(class.next_class_id, Some(grade_1));
        assert!(!class.is_terminal());
        assert!(get_class(&test_db.pool, grade_3).await.unwrap().is_terminal());
    }

    #[tokio::test]
    async fn test_section_with_students_cannot_be_deleted() {
        let test_db = create_standard_test_db().await;

        let result =
            delete_section(&test_db.pool, test_db.section_id("Grade 1", "A")).await;
        assert!(matches!(result, Err(AppError::Conflict(_))));

        delete_section(&test_db.pool, test_db.section_id("Grade 2", "A"))
            .await
            .unwrap();
        assert!(list_sections(&test_db.pool, test_db.class_id("Grade 2")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_student_placement_and_links_checked() {
        let test_db = create_standard_test_db().await;
        let session_id = test_db.session_id("2025-26");

        let base = NewStudent {
            admission_number: "ADM-100".to_string(),
            name: "New Student".to_string(),
            date_of_birth: Some(date(2018, 6, 1)),
            class_id: test_db.class_id("Grade 2"),
            section_id: Some(test_db.section_id("Grade 1", "A")),
            session_id,
            user_id: None,
            parent_id: None,
        };

        let result = create_student(&test_db.pool, &base).await;
        assert!(matches!(result, Err(AppError::Validation(_))));

        let wrong_parent = NewStudent {
            section_id: None,
            parent_id: Some(test_db.user_id("teacher")),
            ..base.clone()
        };
        let result = create_student(&test_db.pool, &wrong_parent).await;
        assert!(matches!(result, Err(AppError::Validation(_))));

        let duplicate = NewStudent {
            admission_number: "ADM-001".to_string(),
            section_id: None,
            ..base.clone()
        };
        let result = create_student(&test_db.pool, &duplicate).await;
        assert!(matches!(result, Err(AppError::Conflict(_))));

        let ok = NewStudent {
            section_id: Some(test_db.section_id("Grade 2", "A")),
            ..base
        };
        let id = create_student(&test_db.pool, &ok).await.unwrap();
        let student = get_student(&test_db.pool, id).await.unwrap();
        assert_eq!(student.class_name, "Grade 2");
        assert_eq!(student.section_name.as_deref(), Some("A"));
        assert_eq!(student.status, StudentStatus::Active);
    }

    #[tokio::test]
    async fn test_update_student_class_change_drops_section() {
        let test_db = create_standard_test_db().await;
        let id = test_db.student_id("ADM-002");

        let updated = update_student(
            &test_db.pool,
            id,
            &StudentChanges {
                class_id: Some(test_db.class_id("Grade 2")),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.class_id, test_db.class_id("Grade 2"));
        assert_eq!(updated.section_id, None);
        assert_eq!(updated.name, "Bilal Khan");

        let updated = update_student(
            &test_db.pool,
            id,
            &StudentChanges {
                name: Some("Bilal A. Khan".to_string()),
                section_id: Some(Some(test_db.section_id("Grade 2", "A"))),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.name, "Bilal A. Khan");
        assert_eq!(updated.section_name.as_deref(), Some("A"));
    }

    #[tokio::test]
    async fn test_search_students() {
        let test_db = create_standard_test_db().await;

        let found = search_students(&test_db.pool, "asha", None).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].admission_number, "ADM-001");

        let found = search_students(&test_db.pool, "ADM-00", None).await.unwrap();
        assert_eq!(found.len(), 4);

        let found = search_students(&test_db.pool, "ADM-00", Some(test_db.class_id("Grade 3")))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);

        // Wildcards in the query match literally.
        assert!(search_students(&test_db.pool, "%", None).await.unwrap().is_empty());
        assert!(search_students(&test_db.pool, "A_M", None).await.unwrap().is_empty());
        assert!(search_students(&test_db.pool, "   ", None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_search_is_limited() {
        let mut builder = TestDbBuilder::new()
            .session("2025-26", date(2025, 4, 1), date(2026, 3, 31), true)
            .class("Grade 1", 1, None);
        for n in 0..30 {
            builder = builder.student(&format!("BULK-{:03}", n), &format!("Bulk {}", n), "Grade 1");
        }
        let test_db = builder.build().await.unwrap();

        let found = search_students(&test_db.pool, "bulk", None).await.unwrap();
        assert_eq!(found.len(), 20);
    }

    #[tokio::test]
    async fn test_students_for_linked_profiles() {
        let test_db = create_standard_test_db().await;

        for key in ["student", "parent"] {
            let linked = list_students_for_user(&test_db.pool, test_db.user_id(key))
                .await
                .unwrap();
            assert_eq!(linked.len(), 1);
            assert_eq!(linked[0].admission_number, "ADM-001");
        }

        assert!(
            list_students_for_user(&test_db.pool, test_db.user_id("teacher"))
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_promotion_moves_and_graduates() {
        let test_db = create_standard_test_db().await;
        let next_session = test_db.session_id("2026-27");
        let asha = test_db.student_id("ADM-001");
        let dara = test_db.student_id("ADM-004");

        let report = promote_students(
            &test_db.pool,
            &[asha, dara, 9999],
            next_session,
            test_db.user_id("admin"),
        )
        .await
        .unwrap();

        assert_eq!(report.promoted, vec![asha]);
        assert_eq!(report.graduated, vec![dara]);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].student_id, 9999);

        let moved = get_student(&test_db.pool, asha).await.unwrap();
        assert_eq!(moved.class_id, test_db.class_id("Grade 2"));
        assert_eq!(moved.section_id, None);
        assert_eq!(moved.session_id, next_session);
        assert_eq!(moved.status, StudentStatus::Active);

        let graduate = get_student(&test_db.pool, dara).await.unwrap();
        assert_eq!(graduate.class_id, test_db.class_id("Grade 3"));
        assert_eq!(graduate.status, StudentStatus::Graduated);

        let history = list_promotions_for_student(&test_db.pool, dara).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].outcome, PromotionOutcome::Graduated);
        assert_eq!(history[0].to_class_id, None);
        assert_eq!(history[0].from_session_id, test_db.session_id("2025-26"));

        // A second run finds both already moved.
        let report = promote_students(&test_db.pool, &[asha, dara], next_session, test_db.user_id("admin"))
            .await
            .unwrap();
        assert!(report.promoted.is_empty());
        assert!(report.graduated.is_empty());
        assert_eq!(report.errors.len(), 2);
    }

    #[tokio::test]
    async fn test_stale_promotion_plan_is_not_applied() {
        let test_db = create_standard_test_db().await;
        let next_session = test_db.session_id("2026-27");
        let admin = test_db.user_id("admin");
        let asha = test_db.student_id("ADM-001");

        let student = get_student(&test_db.pool, asha).await.unwrap();
        let class = get_class(&test_db.pool, student.class_id).await.unwrap();
        let current = get_academic_session(&test_db.pool, student.session_id).await.unwrap();
        let target = get_academic_session(&test_db.pool, next_session).await.unwrap();
        let plan = plan_move(&student, &class, &current, &target).unwrap();

        // Another promotion lands between planning and applying.
        let report = promote_students(&test_db.pool, &[asha], next_session, admin).await.unwrap();
        assert_eq!(report.promoted, vec![asha]);

        let mut report = PromotionReport::default();
        apply_moves(&test_db.pool, vec![plan], next_session, admin, &mut report)
            .await
            .unwrap();

        assert!(report.promoted.is_empty());
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].student_id, asha);
        assert_eq!(list_promotions_for_student(&test_db.pool, asha).await.unwrap().len(), 1);
        assert_eq!(
            get_student(&test_db.pool, asha).await.unwrap().class_id,
            test_db.class_id("Grade 2")
        );
    }

    #[tokio::test]
    async fn test_promotion_into_earlier_session_rejected() {
        let test_db = create_standard_test_db().await;
        let earlier =
            create_academic_session(&test_db.pool, "2024-25", date(2024, 4, 1), date(2025, 3, 31))
                .await
                .unwrap();

        let report = promote_class(
            &test_db.pool,
            test_db.class_id("Grade 1"),
            earlier,
            test_db.user_id("admin"),
        )
        .await
        .unwrap();

        assert!(report.promoted.is_empty());
        assert_eq!(report.errors.len(), 3);
        assert!(
            list_promotions_for_student(&test_db.pool, test_db.student_id("ADM-001"))
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_promote_class_moves_every_active_student() {
        let test_db = create_standard_test_db().await;

        let report = promote_class(
            &test_db.pool,
            test_db.class_id("Grade 1"),
            test_db.session_id("2026-27"),
            test_db.user_id("admin"),
        )
        .await
        .unwrap();

        assert_eq!(report.promoted.len(), 3);
        let grade_2 = list_students(&test_db.pool, Some(test_db.class_id("Grade 2")), None, false)
            .await
            .unwrap();
        assert_eq!(grade_2.len(), 3);
    }

    #[tokio::test]
    async fn test_assignment_upsert_does_not_duplicate() {
        let test_db = create_standard_test_db().await;
        let request = AssignmentRequest {
            teacher_id: test_db.user_id("teacher_two"),
            class_id: test_db.class_id("Grade 2"),
            section_id: None,
            subject_id: Some(test_db.subject_id("Mathematics")),
            is_class_teacher: false,
            can_mark_attendance: false,
        };

        let first = upsert_teacher_assignment(&test_db.pool, &request).await.unwrap();
        let second = upsert_teacher_assignment(
            &test_db.pool,
            &AssignmentRequest {
                can_mark_attendance: true,
                ..request.clone()
            },
        )
        .await
        .unwrap();

        assert_eq!(first.id, second.id);
        assert!(second.can_mark_attendance);

        let rows = list_teacher_assignments(&test_db.pool, Some(test_db.user_id("teacher_two")), None)
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);

        let not_teacher = AssignmentRequest {
            teacher_id: test_db.user_id("accountant"),
            ..request
        };
        let result = upsert_teacher_assignment(&test_db.pool, &not_teacher).await;
        assert!(matches!(result, Err(AppError::Validation(_))));

        delete_teacher_assignment(&test_db.pool, first.id).await.unwrap();
        let result = delete_teacher_assignment(&test_db.pool, first.id).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_attendance_permission_follows_assignment_scope() {
        let test_db = create_standard_test_db()
            .await;
        let teacher = test_db.user_id("teacher");
        let teacher_two = test_db.user_id("teacher_two");
        let grade_1 = test_db.class_id("Grade 1");
        let section_a = test_db.section_id("Grade 1", "A");
        let section_b = test_db.section_id("Grade 1", "B");

        // Class-wide assignment covers every section.
        assert!(teacher_can_mark_attendance(&test_db.pool, teacher, grade_1, None).await.unwrap());
        assert!(teacher_can_mark_attendance(&test_db.pool, teacher, grade_1, Some(section_b)).await.unwrap());
        assert!(!teacher_can_mark_attendance(&test_db.pool, teacher_two, grade_1, None).await.unwrap());

        upsert_teacher_assignment(
            &test_db.pool,
            &AssignmentRequest {
                teacher_id: teacher_two,
                class_id: grade_1,
                section_id: Some(section_a),
                subject_id: None,
                is_class_teacher: false,
                can_mark_attendance: true,
            },
        )
        .await
        .unwrap();

        assert!(teacher_can_mark_attendance(&test_db.pool, teacher_two, grade_1, Some(section_a)).await.unwrap());
        assert!(!teacher_can_mark_attendance(&test_db.pool, teacher_two, grade_1, Some(section_b)).await.unwrap());
        assert!(!teacher_can_mark_attendance(&test_db.pool, teacher_two, grade_1, None).await.unwrap());
    }

    #[tokio::test]
    async fn test_remarking_attendance_overwrites() {
        let test_db = create_standard_test_db().await;
        let grade_1 = test_db.class_id("Grade 1");
        let asha = test_db.student_id("ADM-001");
        let bilal = test_db.student_id("ADM-002");
        let day = date(2025, 9, 1);
        let teacher = test_db.user_id("teacher");

        let marked = mark_attendance(
            &test_db.pool,
            grade_1,
            None,
            day,
            &[
                AttendanceEntry { student_id: asha, status: AttendanceStatus::Present },
                AttendanceEntry { student_id: bilal, status: AttendanceStatus::Absent },
            ],
            teacher,
        )
        .await
        .unwrap();
        assert_eq!(marked, 2);

        mark_attendance(
            &test_db.pool,
            grade_1,
            None,
            day,
            &[AttendanceEntry { student_id: bilal, status: AttendanceStatus::Late }],
            teacher,
        )
        .await
        .unwrap();

        let records = list_attendance(&test_db.pool, grade_1, None, day).await.unwrap();
        assert_eq!(records.len(), 2);
        let bilal_record = records.iter().find(|r| r.student_id == bilal).unwrap();
        assert_eq!(bilal_record.status, AttendanceStatus::Late);
        assert_eq!(count_marked(&test_db.pool, grade_1, day).await.unwrap(), 2);

        let summary = attendance_summary(&test_db.pool, bilal, None, None).await.unwrap();
        assert_eq!(summary.total, 1);
        assert_eq!(summary.late, 1);
        assert_eq!(summary.absent, 0);
    }

    #[tokio::test]
    async fn test_attendance_rejects_outsiders_atomically() {
        let test_db = create_standard_test_db().await;
        let grade_1 = test_db.class_id("Grade 1");
        let day = date(2025, 9, 2);

        // Chen is in section B, Dara in another class.
        let result = mark_attendance(
            &test_db.pool,
            grade_1,
            Some(test_db.section_id("Grade 1", "A")),
            day,
            &[
                AttendanceEntry { student_id: test_db.student_id("ADM-001"), status: AttendanceStatus::Present },
                AttendanceEntry { student_id: test_db.student_id("ADM-003"), status: AttendanceStatus::Present },
                AttendanceEntry { student_id: test_db.student_id("ADM-004"), status: AttendanceStatus::Present },
            ],
            test_db.user_id("teacher"),
        )
        .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
        assert_eq!(count_marked(&test_db.pool, grade_1, day).await.unwrap(), 0);

        let result = mark_attendance(&test_db.pool, grade_1, None, day, &[], test_db.user_id("teacher")).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_attendance_rejects_repeated_student() {
        let test_db = create_standard_test_db().await;
        let grade_1 = test_db.class_id("Grade 1");
        let asha = test_db.student_id("ADM-001");
        let day = date(2025, 9, 3);

        let result = mark_attendance(
            &test_db.pool,
            grade_1,
            None,
            day,
            &[
                AttendanceEntry { student_id: asha, status: AttendanceStatus::Present },
                AttendanceEntry { student_id: asha, status: AttendanceStatus::Absent },
            ],
            test_db.user_id("teacher"),
        )
        .await;

        match result {
            Err(AppError::Validation(msg)) => assert!(msg.contains("more than once")),
            other => panic!("expected validation error, got {:?}", other),
        }
        assert_eq!(count_marked(&test_db.pool, grade_1, day).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_attendance_summary_date_range() {
        let test_db = create_standard_test_db().await;
        let grade_1 = test_db.class_id("Grade 1");
        let asha = test_db.student_id("ADM-001");

        for (day, status) in [
            (date(2025, 9, 1), AttendanceStatus::Present),
            (date(2025, 9, 2), AttendanceStatus::Absent),
            (date(2025, 10, 1), AttendanceStatus::Excused),
        ] {
            mark_attendance(
                &test_db.pool,
                grade_1,
                None,
                day,
                &[AttendanceEntry { student_id: asha, status }],
                test_db.user_id("teacher"),
            )
            .await
            .unwrap();
        }

        let september =
            attendance_summary(&test_db.pool, asha, Some(date(2025, 9, 1)), Some(date(2025, 9, 30)))
                .await
                .unwrap();
        assert_eq!(september.total, 2);
        assert_eq!(september.present, 1);
        assert_eq!(september.absent, 1);
        assert_eq!(september.excused, 0);

        let all = attendance_summary(&test_db.pool, asha, None, None).await.unwrap();
        assert_eq!(all.total, 3);
    }

    async fn tuition(test_db: &TestDb, amount_cents: i64) -> i64 {
        create_fee_structure(
            &test_db.pool,
            &NewFeeStructure {
                class_id: test_db.class_id("Grade 1"),
                session_id: test_db.session_id("2025-26"),
                name: "Tuition".to_string(),
                amount_cents,
                due_date: Some(date(2025, 6, 30)),
            },
        )
        .await
        .unwrap()
    }

    fn payment(student_id: i64, fee_structure_id: i64, amount_cents: i64) -> NewPayment {
        NewPayment {
            student_id,
            fee_structure_id,
            amount_cents,
            method: PaymentMethod::Cash,
            paid_on: date(2025, 6, 1),
        }
    }

    #[tokio::test]
    async fn test_payments_cannot_exceed_balance() {
        let test_db = create_standard_test_db().await;
        let fee = tuition(&test_db, 50_000).await;
        let asha = test_db.student_id("ADM-001");
        let accountant = test_db.user_id("accountant");

        let first = record_payment(&test_db.pool, &payment(asha, fee, 30_000), accountant)
            .await
            .unwrap();
        assert!(first.receipt_number.starts_with("RCPT-"));
        assert_eq!(first.receipt_number.len(), 17);

        let result = record_payment(&test_db.pool, &payment(asha, fee, 20_001), accountant).await;
        assert!(matches!(result, Err(AppError::Validation(_))));

        let second = record_payment(&test_db.pool, &payment(asha, fee, 20_000), accountant)
            .await
            .unwrap();
        assert_ne!(first.receipt_number, second.receipt_number);

        let result = record_payment(&test_db.pool, &payment(asha, fee, 1), accountant).await;
        assert!(matches!(result, Err(AppError::Validation(_))));

        let summary = student_fee_summary(&test_db.pool, asha).await.unwrap();
        assert_eq!(summary.total_due_cents, 50_000);
        assert_eq!(summary.total_paid_cents, 50_000);
        assert_eq!(summary.balance_cents, 0);
        assert_eq!(list_payments_for_student(&test_db.pool, asha).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_payment_must_match_student_class() {
        let test_db = create_standard_test_db().await;
        let fee = tuition(&test_db, 50_000).await;
        let accountant = test_db.user_id("accountant");

        let result = record_payment(
            &test_db.pool,
            &payment(test_db.student_id("ADM-004"), fee, 100),
            accountant,
        )
        .await;
        assert!(matches!(result, Err(AppError::Validation(_))));

        let result = record_payment(
            &test_db.pool,
            &payment(test_db.student_id("ADM-001"), fee, 0),
            accountant,
        )
        .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_fee_structure_rules() {
        let test_db = create_standard_test_db().await;
        tuition(&test_db, 50_000).await;

        let duplicate = NewFeeStructure {
            class_id: test_db.class_id("Grade 1"),
            session_id: test_db.session_id("2025-26"),
            name: "Tuition".to_string(),
            amount_cents: 10,
            due_date: None,
        };
        let result = create_fee_structure(&test_db.pool, &duplicate).await;
        assert!(matches!(result, Err(AppError::Conflict(_))));

        let negative = NewFeeStructure {
            name: "Refund".to_string(),
            amount_cents: -5,
            ..duplicate
        };
        let result = create_fee_structure(&test_db.pool, &negative).await;
        assert!(matches!(result, Err(AppError::Validation(_))));

        let listed = list_fee_structures(&test_db.pool, None, Some(test_db.class_id("Grade 1")))
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
    }

    #[tokio::test]
    async fn test_collection_summary_and_dashboard_totals() {
        let test_db = create_standard_test_db().await;
        let session_id = test_db.session_id("2025-26");
        let fee = tuition(&test_db, 10_000).await;
        let accountant = test_db.user_id("accountant");

        record_payment(&test_db.pool, &payment(test_db.student_id("ADM-001"), fee, 10_000), accountant)
            .await
            .unwrap();
        record_payment(&test_db.pool, &payment(test_db.student_id("ADM-002"), fee, 2_500), accountant)
            .await
            .unwrap();

        let classes = collection_summary(&test_db.pool, session_id).await.unwrap();
        let grade_1 = classes.iter().find(|c| c.class_name == "Grade 1").unwrap();
        assert_eq!(grade_1.due_cents, 30_000);
        assert_eq!(grade_1.collected_cents, 12_500);
        let grade_3 = classes.iter().find(|c| c.class_name == "Grade 3").unwrap();
        assert_eq!(grade_3.due_cents, 0);

        let totals = session_fee_totals(&test_db.pool, session_id).await.unwrap();
        assert_eq!(
            totals,
            FeeTotals {
                due_cents: 30_000,
                collected_cents: 12_500,
                outstanding_cents: 17_500,
            }
        );

        let empty = session_fee_totals(&test_db.pool, test_db.session_id("2026-27")).await.unwrap();
        assert_eq!(empty, FeeTotals::default());

        let overview = school_overview(&test_db.pool).await.unwrap();
        assert_eq!(overview.active_students, 4);
        assert_eq!(overview.teachers, 2);
        assert_eq!(overview.classes, 3);
        assert_eq!(overview.fees_collected_cents, 12_500);
        assert_eq!(overview.active_session.map(|s| s.id), Some(session_id));
    }

    #[tokio::test]
    async fn test_feedback_is_answered_once() {
        let test_db = create_standard_test_db().await;
        let parent = test_db.user_id("parent");
        let admin = test_db.user_id("admin");

        let id = submit_feedback(&test_db.pool, parent, "Bus timing", "The bus arrives late.")
            .await
            .unwrap();
        assert_eq!(count_open_feedback(&test_db.pool).await.unwrap(), 1);

        let answered = respond_to_feedback(&test_db.pool, id, admin, "We will check with the driver.")
            .await
            .unwrap();
        assert_eq!(answered.status, FeedbackStatus::Responded);
        assert_eq!(answered.responded_by, Some(admin));
        assert!(answered.responded_at.is_some());
        assert_eq!(answered.submitter_name, "parent");

        let result = respond_to_feedback(&test_db.pool, id, admin, "Again").await;
        assert!(matches!(result, Err(AppError::Conflict(_))));

        let result = respond_to_feedback(&test_db.pool, 9999, admin, "Nobody").await;
        assert!(matches!(result, Err(AppError::NotFound(_))));

        assert_eq!(count_open_feedback(&test_db.pool).await.unwrap(), 0);
        let own = list_feedback(&test_db.pool, Some(parent), None).await.unwrap();
        assert_eq!(own.len(), 1);
        let open = list_feedback(&test_db.pool, None, Some(FeedbackStatus::Open)).await.unwrap();
        assert!(open.is_empty());
    }

    #[tokio::test]
    async fn test_transfer_certificate_withdraws_student() {
        let test_db = create_standard_test_db().await;
        let bilal = test_db.student_id("ADM-002");
        let operator = test_db.user_id("operator");

        let bonafide = issue_certificate(
            &test_db.pool,
            bilal,
            CertificateKind::Bonafide,
            date(2025, 7, 1),
            None,
            operator,
        )
        .await
        .unwrap();
        assert!(bonafide.serial_number.starts_with("BON-2025-"));
        assert_eq!(
            get_student(&test_db.pool, bilal).await.unwrap().status,
            StudentStatus::Active
        );

        let transfer = issue_certificate(
            &test_db.pool,
            bilal,
            CertificateKind::Transfer,
            date(2025, 8, 15),
            Some("Family relocating"),
            operator,
        )
        .await
        .unwrap();
        assert!(transfer.serial_number.starts_with("TC-2025-"));
        assert_eq!(transfer.remarks.as_deref(), Some("Family relocating"));
        assert_eq!(
            get_student(&test_db.pool, bilal).await.unwrap().status,
            StudentStatus::Withdrawn
        );

        let result = issue_certificate(
            &test_db.pool,
            bilal,
            CertificateKind::Transfer,
            date(2025, 8, 16),
            None,
            operator,
        )
        .await;
        assert!(matches!(result, Err(AppError::Conflict(_))));

        let found = find_certificate_by_serial(&test_db.pool, &transfer.serial_number)
            .await
            .unwrap();
        assert_eq!(found.student_name, "Bilal Khan");
        assert_eq!(list_certificates_for_student(&test_db.pool, bilal).await.unwrap().len(), 2);

        let result = find_certificate_by_serial(&test_db.pool, "TC-2025-NOPE").await;
        assert!(matches!(result, Err(AppError::NotFound(_))));

        // Withdrawn students drop out of the default listing.
        let listed = list_students(&test_db.pool, Some(test_db.class_id("Grade 1")), None, false)
            .await
            .unwrap();
        assert!(listed.iter().all(|s| s.id != bilal));
        let listed = list_students(&test_db.pool, Some(test_db.class_id("Grade 1")), None, true)
            .await
            .unwrap();
        assert!(listed.iter().any(|s| s.id == bilal));
    }

    #[tokio::test]
    async fn test_result_deadline_lifecycle() {
        let test_db = create_standard_test_db().await;
        let session_id = test_db.session_id("2025-26");
        let grade_1 = test_db.class_id("Grade 1");
        let admin = test_db.user_id("admin");

        let school_wide = create_result_deadline(
            &test_db.pool,
            &DeadlineFields {
                session_id,
                class_id: None,
                title: "Term 1 results".to_string(),
                deadline: date(2025, 10, 15),
            },
            admin,
        )
        .await
        .unwrap();
        let grade_only = create_result_deadline(
            &test_db.pool,
            &DeadlineFields {
                session_id,
                class_id: Some(test_db.class_id("Grade 2")),
                title: "Grade 2 project".to_string(),
                deadline: date(2025, 11, 1),
            },
            admin,
        )
        .await
        .unwrap();

        // School-wide deadlines apply to every class.
        let for_grade_1 = list_result_deadlines(&test_db.pool, Some(session_id), Some(grade_1))
            .await
            .unwrap();
        assert_eq!(for_grade_1.len(), 1);
        assert_eq!(for_grade_1[0].id, school_wide.id);

        let updated = update_result_deadline(
            &test_db.pool,
            grade_only.id,
            &DeadlineFields {
                session_id,
                class_id: Some(grade_1),
                title: "Grade 1 project".to_string(),
                deadline: date(2025, 11, 5),
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.class_id, Some(grade_1));
        assert_eq!(updated.created_by, Some(admin));

        let result = create_result_deadline(
            &test_db.pool,
            &DeadlineFields {
                session_id: 9999,
                class_id: None,
                title: "Nowhere".to_string(),
                deadline: date(2025, 11, 5),
            },
            admin,
        )
        .await;
        assert!(result.is_err());

        delete_result_deadline(&test_db.pool, school_wide.id).await.unwrap();
        let result = delete_result_deadline(&test_db.pool, school_wide.id).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
        assert_eq!(
            list_result_deadlines(&test_db.pool, None, None).await.unwrap().len(),
            1
        );
    }

    #[tokio::test]
    async fn test_teacher_marked_on_counts_assigned_classes() {
        let test_db = create_standard_test_db().await;
        let teacher = test_db.user_id("teacher");
        let day = date(2025, 9, 3);

        mark_attendance(
            &test_db.pool,
            test_db.class_id("Grade 1"),
            None,
            day,
            &[AttendanceEntry {
                student_id: test_db.student_id("ADM-003"),
                status: AttendanceStatus::Present,
            }],
            teacher,
        )
        .await
        .unwrap();

        let marked = teacher_marked_on(&test_db.pool, teacher, day).await.unwrap();
        assert_eq!(marked.len(), 1);
        assert_eq!(marked[0].class_name, "Grade 1");
        assert_eq!(marked[0].marked, 1);

        let none = teacher_marked_on(&test_db.pool, test_db.user_id("teacher_two"), day)
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_user_management_rules() {
        let test_db = create_standard_test_db().await;

        let result = create_user(&test_db.pool, "admin@school.test", "Dup", "password123", Role::Teacher).await;
        assert!(matches!(result, Err(AppError::Conflict(_))));

        let teachers = list_users(&test_db.pool, Some(Role::Teacher)).await.unwrap();
        assert_eq!(teachers.len(), 2);

        let operator = test_db.user_id("operator");
        let update = UserUpdate {
            name: Some("Omar Farooq"),
            role: Some(Role::Accountant),
            is_active: Some(false),
        };
        update_user(&test_db.pool, operator, update).await.unwrap();
        let updated = get_user(&test_db.pool, operator).await.unwrap();
        assert_eq!(updated.name, "Omar Farooq");
        assert_eq!(updated.role, Role::Accountant);
        assert!(!updated.is_active);

        // Fields left out stay as they were.
        let rename_only = UserUpdate { name: Some("Omar F."), ..Default::default() };
        update_user(&test_db.pool, operator, rename_only).await.unwrap();
        let renamed = get_user(&test_db.pool, operator).await.unwrap();
        assert_eq!(renamed.name, "Omar F.");
        assert_eq!(renamed.role, Role::Accountant);
        assert!(!renamed.is_active);

        let result = update_user(&test_db.pool, 9999, update).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));

        // Bootstrap only creates the super admin once.
        let created = ensure_bootstrap_admin(&test_db.pool, "head@school.test", "Head", "changeme123")
            .await
            .unwrap();
        assert!(created.is_none());
    }

    #[tokio::test]
    async fn test_emails_are_case_insensitive() {
        let test_db = create_standard_test_db().await;

        let id = create_user(
            &test_db.pool,
            " Nadia.Rahman@School.TEST ",
            "Nadia Rahman",
            "password123",
            Role::Teacher,
        )
        .await
        .unwrap();
        assert_eq!(get_user(&test_db.pool, id).await.unwrap().email, "nadia.rahman@school.test");

        let result = create_user(
            &test_db.pool,
            "NADIA.RAHMAN@school.test",
            "Impostor",
            "password123",
            Role::Parent,
        )
        .await;
        assert!(matches!(result, Err(AppError::Conflict(_))));

        let user = authenticate_user(&test_db.pool, "nadia.RAHMAN@school.test", "password123")
            .await
            .unwrap()
            .expect("login should ignore email case");
        assert_eq!(user.id, id);

        let found = find_user_by_email(&test_db.pool, "Admin@School.Test").await.unwrap();
        assert_eq!(found.map(|u| u.id), Some(test_db.user_id("admin")));
    }

    #[tokio::test]
    async fn test_bootstrap_admin_created_on_empty_database() {
        let test_db = TestDbBuilder::new().build().await.unwrap();

        let created = ensure_bootstrap_admin(&test_db.pool, "head@school.test", "Head", "changeme123")
            .await
            .unwrap();
        let id = created.expect("bootstrap admin should be created");
        assert_eq!(get_user(&test_db.pool, id).await.unwrap().role, Role::SuperAdmin);

        let again = ensure_bootstrap_admin(&test_db.pool, "other@school.test", "Other", "changeme123")
            .await
            .unwrap();
        assert!(again.is_none());
    }
}
