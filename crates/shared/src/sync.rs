//! Протокол синхронизации выделения между окнами просмотра

use serde::{Deserialize, Serialize};

use crate::{FaceId, VertexId, ViewportId};

/// Фиксированный набор тем шины синхронизации
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Topic {
    FaceHighlighted,
    FaceUnhighlighted,
    FaceSelected,
    FaceUnselected,
    FaceDraggingBegin,
    FaceDragging,
    FaceDraggingEnd,
    VertexSelected,
    VertexUnselected,
    HighlightFace,
    UnhighlightFace,
}

impl Topic {
    pub const ALL: [Topic; 11] = [
        Topic::FaceHighlighted,
        Topic::FaceUnhighlighted,
        Topic::FaceSelected,
        Topic::FaceUnselected,
        Topic::FaceDraggingBegin,
        Topic::FaceDragging,
        Topic::FaceDraggingEnd,
        Topic::VertexSelected,
        Topic::VertexUnselected,
        Topic::HighlightFace,
        Topic::UnhighlightFace,
    ];

    /// Строковое имя темы (как на проводе)
    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::FaceHighlighted => "face-highlighted",
            Topic::FaceUnhighlighted => "face-unhighlighted",
            Topic::FaceSelected => "face-selected",
            Topic::FaceUnselected => "face-unselected",
            Topic::FaceDraggingBegin => "face-dragging-begin",
            Topic::FaceDragging => "face-dragging",
            Topic::FaceDraggingEnd => "face-dragging-end",
            Topic::VertexSelected => "vertex-selected",
            Topic::VertexUnselected => "vertex-unselected",
            Topic::HighlightFace => "highlight-face",
            Topic::UnhighlightFace => "unhighlight-face",
        }
    }

    /// Темы, связанные с гранями (подчиняются флагу syncFaceSelection)
    pub fn is_face_sync(&self) -> bool {
        matches!(
            self,
            Topic::FaceHighlighted
                | Topic::FaceUnhighlighted
                | Topic::FaceSelected
                | Topic::FaceUnselected
                | Topic::FaceDraggingBegin
                | Topic::FaceDragging
                | Topic::FaceDraggingEnd
        )
    }

    /// Темы, связанные с вершинами (подчиняются флагу syncVertexSelection)
    pub fn is_vertex_sync(&self) -> bool {
        matches!(self, Topic::VertexSelected | Topic::VertexUnselected)
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Полезная нагрузка сообщения; форма зависит от темы
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "topic", rename_all = "kebab-case")]
pub enum SyncPayload {
    FaceHighlighted {
        face: FaceId,
    },
    FaceUnhighlighted,
    FaceSelected {
        face: FaceId,
    },
    FaceUnselected {
        face: FaceId,
    },
    FaceDraggingBegin {
        face: FaceId,
    },
    /// `offset`: приращение относительно предыдущего кадра, не абсолютная позиция
    FaceDragging {
        face: FaceId,
        offset: [f32; 3],
    },
    FaceDraggingEnd {
        face: FaceId,
    },
    VertexSelected {
        #[serde(rename = "vertexId")]
        vertex_id: VertexId,
    },
    VertexUnselected {
        #[serde(rename = "vertexId")]
        vertex_id: VertexId,
    },
    /// Принудительная подсветка (перекрёстная связь несвязанных окон)
    HighlightFace {
        face: FaceId,
    },
    UnhighlightFace,
}

impl SyncPayload {
    pub fn topic(&self) -> Topic {
        match self {
            SyncPayload::FaceHighlighted { .. } => Topic::FaceHighlighted,
            SyncPayload::FaceUnhighlighted => Topic::FaceUnhighlighted,
            SyncPayload::FaceSelected { .. } => Topic::FaceSelected,
            SyncPayload::FaceUnselected { .. } => Topic::FaceUnselected,
            SyncPayload::FaceDraggingBegin { .. } => Topic::FaceDraggingBegin,
            SyncPayload::FaceDragging { .. } => Topic::FaceDragging,
            SyncPayload::FaceDraggingEnd { .. } => Topic::FaceDraggingEnd,
            SyncPayload::VertexSelected { .. } => Topic::VertexSelected,
            SyncPayload::VertexUnselected { .. } => Topic::VertexUnselected,
            SyncPayload::HighlightFace { .. } => Topic::HighlightFace,
            SyncPayload::UnhighlightFace => Topic::UnhighlightFace,
        }
    }
}

/// Сообщение шины: источник + тема + данные
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncMessage {
    #[serde(rename = "originId")]
    pub origin_id: ViewportId,
    #[serde(flatten)]
    pub payload: SyncPayload,
}

impl SyncMessage {
    pub fn new(origin_id: ViewportId, payload: SyncPayload) -> Self {
        Self { origin_id, payload }
    }

    pub fn topic(&self) -> Topic {
        self.payload.topic()
    }

    /// Сообщение отправлено этим же окном (эхо)
    pub fn is_from(&self, id: ViewportId) -> bool {
        self.origin_id == id
    }
}
