use super::common::*;
use crate::registro::UserId;
use crate::workflows::expedientes::documentos::DocumentError;
use crate::workflows::expedientes::domain::{
    DocumentKind, SubmissionStatus, SubsanadoTarget, UploadedFile,
};
use chrono::{TimeZone, Utc};

fn owner() -> UserId {
    UserId("u-docs".to_string())
}

#[test]
fn upload_rejects_non_pdf() {
    let (service, _) = submission_service();
    let err = service
        .upload(
            expediente("p-1"),
            &owner(),
            DocumentKind::Personal,
            UploadedFile {
                nombre: "dni.docx".to_string(),
                bytes: b"contenido".to_vec(),
            },
            false,
            Utc::now(),
        )
        .unwrap_err();
    assert!(matches!(err, DocumentError::InvalidFileFormat { .. }));
}

#[test]
fn upload_rejects_oversized_file() {
    let (service, _) = submission_service();
    let bytes = vec![0u8; (service.policy().max_bytes() + 1) as usize];
    let err = service
        .upload(
            expediente("p-1"),
            &owner(),
            DocumentKind::Personal,
            UploadedFile {
                nombre: "grande.pdf".to_string(),
                bytes,
            },
            false,
            Utc::now(),
        )
        .unwrap_err();
    match err {
        DocumentError::FileTooLarge { size, max_bytes } => {
            assert_eq!(size, max_bytes + 1);
        }
        other => panic!("expected FileTooLarge, got {other:?}"),
    }
}

#[test]
fn quota_counts_pending_and_sent_together() {
    let (service, _) = submission_service();
    let exp = expediente("p-quota");
    let user = owner();
    let now = Utc::now();

    for i in 0..2 {
        service
            .upload(
                exp.clone(),
                &user,
                DocumentKind::Personal,
                pdf(&format!("doc-{i}.pdf")),
                false,
                now,
            )
            .expect("under quota");
    }
    service
        .confirm_batch(&exp, DocumentKind::Personal, now)
        .expect("batch confirms");

    // Two sent plus one pending: the third upload still fits.
    service
        .upload(exp.clone(), &user, DocumentKind::Personal, pdf("doc-2.pdf"), false, now)
        .expect("third slot");

    let err = service
        .upload(exp.clone(), &user, DocumentKind::Personal, pdf("doc-3.pdf"), false, now)
        .unwrap_err();
    match err {
        DocumentError::QuotaExceeded { kind, remaining } => {
            assert_eq!(kind, "personal");
            assert_eq!(remaining, 0);
        }
        other => panic!("expected QuotaExceeded, got {other:?}"),
    }
    assert_eq!(
        service.remaining(&exp, DocumentKind::Personal).expect("count"),
        0
    );
}

#[test]
fn quota_buckets_are_independent_per_kind() {
    let (service, _) = submission_service();
    let exp = expediente("p-kinds");
    let user = owner();
    let now = Utc::now();

    for i in 0..3 {
        service
            .upload(
                exp.clone(),
                &user,
                DocumentKind::Personal,
                pdf(&format!("pers-{i}.pdf")),
                false,
                now,
            )
            .expect("personal quota");
    }
    service
        .upload(exp.clone(), &user, DocumentKind::Proyecto, pdf("carpeta.pdf"), false, now)
        .expect("project bucket unaffected");
}

#[test]
fn correction_targets_share_one_bucket() {
    let (service, _) = submission_service();
    let exp = expediente("p-sub");
    let user = owner();
    let now = Utc::now();

    for i in 0..2 {
        service
            .upload(
                exp.clone(),
                &user,
                DocumentKind::Subsanado(SubsanadoTarget::Proyecto),
                pdf(&format!("sub-{i}.pdf")),
                true,
                now,
            )
            .expect("under quota");
    }
    service
        .upload(
            exp.clone(),
            &user,
            DocumentKind::Subsanado(SubsanadoTarget::Admin),
            pdf("sub-admin.pdf"),
            true,
            now,
        )
        .expect("third in shared bucket");

    let err = service
        .upload(
            exp,
            &user,
            DocumentKind::Subsanado(SubsanadoTarget::Admin),
            pdf("sub-3.pdf"),
            true,
            now,
        )
        .unwrap_err();
    assert!(matches!(err, DocumentError::QuotaExceeded { kind: "subsanado", .. }));
}

#[test]
fn delete_requires_ownership_and_pending_state() {
    let (service, _) = submission_service();
    let exp = expediente("p-del");
    let user = owner();
    let intruso = UserId("otro".to_string());
    let now = Utc::now();

    let doc = service
        .upload(exp.clone(), &user, DocumentKind::Personal, pdf("dni.pdf"), false, now)
        .expect("upload");

    let err = service.delete(&doc.id, &intruso).unwrap_err();
    assert!(matches!(err, DocumentError::Forbidden));

    service
        .confirm_batch(&exp, DocumentKind::Personal, now)
        .expect("confirm");
    let err = service.delete(&doc.id, &user).unwrap_err();
    assert!(matches!(err, DocumentError::InvalidState));
}

#[test]
fn deleting_a_pending_document_frees_its_quota_slot() {
    let (service, _) = submission_service();
    let exp = expediente("p-free");
    let user = owner();
    let now = Utc::now();

    let mut last = None;
    for i in 0..3 {
        last = Some(
            service
                .upload(
                    exp.clone(),
                    &user,
                    DocumentKind::Personal,
                    pdf(&format!("d-{i}.pdf")),
                    false,
                    now,
                )
                .expect("upload"),
        );
    }
    let last = last.expect("three uploads");
    service.delete(&last.id, &user).expect("delete pending");
    service
        .upload(exp, &user, DocumentKind::Personal, pdf("d-again.pdf"), false, now)
        .expect("slot freed");
}

#[test]
fn confirm_batch_stamps_every_pending_row() {
    let (service, _) = submission_service();
    let exp = expediente("p-batch");
    let user = owner();
    let subida = Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).single().expect("valid");
    let envio = Utc.with_ymd_and_hms(2026, 3, 3, 9, 30, 0).single().expect("valid");

    for i in 0..2 {
        service
            .upload(
                exp.clone(),
                &user,
                DocumentKind::Proyecto,
                pdf(&format!("c-{i}.pdf")),
                false,
                subida,
            )
            .expect("upload");
    }

    let confirmados = service
        .confirm_batch(&exp, DocumentKind::Proyecto, envio)
        .expect("confirm");
    assert_eq!(confirmados.len(), 2);
    for doc in &confirmados {
        assert_eq!(doc.estado, SubmissionStatus::Enviado);
        assert_eq!(doc.fecha_envio, Some(envio));
    }

    let err = service.confirm_batch(&exp, DocumentKind::Proyecto, envio).unwrap_err();
    assert!(matches!(err, DocumentError::NothingPending { kind: "proyecto" }));
}

#[test]
fn concurrent_uploads_never_exceed_the_quota() {
    use std::sync::Arc;

    let (service, _) = submission_service();
    let service = Arc::new(service);
    let exp = expediente("p-race");
    let now = Utc::now();

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let service = service.clone();
            let exp = exp.clone();
            std::thread::spawn(move || {
                service.upload(
                    exp,
                    &UserId("u-race".to_string()),
                    DocumentKind::Personal,
                    UploadedFile {
                        nombre: format!("r-{i}.pdf"),
                        bytes: b"%PDF-1.4 fixture".to_vec(),
                    },
                    false,
                    now,
                )
            })
        })
        .collect();

    let results: Vec<_> = handles
        .into_iter()
        .map(|h| h.join().expect("thread completes"))
        .collect();

    let accepted = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(accepted, 3);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| matches!(e, DocumentError::QuotaExceeded { remaining: 0, .. })));
    assert_eq!(
        service.remaining(&exp, DocumentKind::Personal).expect("count"),
        0
    );
}

#[test]
fn uploaded_payload_lands_in_blob_store() {
    let (service, blobs) = submission_service();
    let exp = expediente("p-blob");
    let doc = service
        .upload(exp, &owner(), DocumentKind::Personal, pdf("dni.pdf"), false, Utc::now())
        .expect("upload");
    assert!(blobs.contiene(&doc.archivo.0));
}
